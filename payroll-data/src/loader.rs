use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use payroll_core::db::supersede;
use payroll_core::{
    Bracket, GraduatedParameters, InsuranceRelief, NewTaxRuleVersion, PercentageParameters,
    RateShape, RepositoryError, RuleParameters, TaxKind, TaxRuleRepository, TierBand,
    TieredParameters,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors that can occur when loading rule versions.
#[derive(Debug, Error)]
pub enum RuleLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Unknown tax kind '{0}'")]
    UnknownKind(String),

    #[error("Invalid {kind} version effective {effective_from}: {reason}")]
    InvalidVersion {
        kind: TaxKind,
        effective_from: NaiveDate,
        reason: String,
    },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for RuleLoaderError {
    fn from(err: csv::Error) -> Self {
        RuleLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a rules CSV file.
///
/// Rows sharing `tax_kind` and `effective_from` form one rule version.
/// Graduated and tiered versions take one row per band, in order; a
/// percentage version takes exactly one row. Version-level columns
/// (`effective_to`, reliefs, `notes`) are read from the first row of the
/// group.
///
/// | column                  | used by              |
/// |-------------------------|----------------------|
/// | `tax_kind`              | all (`PAYE`, `NSSF_TIER1`, `NSSF_TIER2`, `SHIF`, `HOUSING_LEVY`) |
/// | `effective_from`        | all                  |
/// | `effective_to`          | all, empty when open |
/// | `label`                 | tiered               |
/// | `lower_bound`           | graduated, tiered    |
/// | `upper_bound`           | graduated, tiered; empty for the open top band |
/// | `rate`                  | all, as a fraction   |
/// | `min_amount`            | percentage           |
/// | `max_amount`            | percentage           |
/// | `personal_relief`       | graduated            |
/// | `insurance_relief_rate` | graduated            |
/// | `insurance_relief_max`  | graduated            |
/// | `notes`                 | all                  |
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuleVersionRecord {
    pub tax_kind: String,
    pub effective_from: NaiveDate,
    #[serde(default)]
    pub effective_to: Option<NaiveDate>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub lower_bound: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub min_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub max_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub personal_relief: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub insurance_relief_rate: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub insurance_relief_max: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn deserialize_optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => s
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// How [`RuleVersionLoader::load`] treats versions already in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Insert alongside existing versions.
    #[default]
    Append,
    /// Close open-ended predecessors the day before each new version.
    Supersede,
}

/// Summary of a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: usize,
    /// Versions skipped because one of the same kind and start date exists.
    pub skipped: usize,
    /// Predecessors closed in [`LoadMode::Supersede`].
    pub closed: usize,
}

/// Loader for rule versions from CSV files.
///
/// Reads CSV data and writes it through [`TaxRuleRepository`], so it works
/// with any backend.
pub struct RuleVersionLoader;

impl RuleVersionLoader {
    /// Parse rule rows from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<RuleVersionRecord>, RuleLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: RuleVersionRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Group rows into validated rule versions, ordered by kind then date.
    ///
    /// # Errors
    ///
    /// * [`RuleLoaderError::UnknownKind`] for an unrecognised `tax_kind`.
    /// * [`RuleLoaderError::InvalidVersion`] when a group is missing a
    ///   required column or fails validation.
    pub fn build(records: &[RuleVersionRecord]) -> Result<Vec<NewTaxRuleVersion>, RuleLoaderError> {
        let mut groups: BTreeMap<(TaxKind, NaiveDate), Vec<&RuleVersionRecord>> = BTreeMap::new();

        for record in records {
            let kind = TaxKind::parse(&record.tax_kind)
                .ok_or_else(|| RuleLoaderError::UnknownKind(record.tax_kind.clone()))?;
            groups
                .entry((kind, record.effective_from))
                .or_default()
                .push(record);
        }

        groups
            .into_iter()
            .map(|((kind, effective_from), rows)| build_version(kind, effective_from, &rows))
            .collect()
    }

    /// Load rule rows into the repository.
    ///
    /// A version whose kind and `effective_from` already exist is skipped,
    /// which makes reloading the same file a no-op.
    pub async fn load<R: TaxRuleRepository + ?Sized>(
        repo: &R,
        records: &[RuleVersionRecord],
        mode: LoadMode,
    ) -> Result<LoadReport, RuleLoaderError> {
        let versions = Self::build(records)?;
        let mut report = LoadReport::default();

        for version in versions {
            let exists = repo
                .list_versions(version.kind)
                .await?
                .iter()
                .any(|existing| existing.effective_from == version.effective_from);
            if exists {
                info!(
                    kind = %version.kind,
                    effective_from = %version.effective_from,
                    "rule version already present, skipping"
                );
                report.skipped += 1;
                continue;
            }

            let kind = version.kind;
            let effective_from = version.effective_from;
            match mode {
                LoadMode::Append => {
                    repo.insert_version(version).await?;
                }
                LoadMode::Supersede => {
                    let result = supersede(repo, version).await?;
                    report.closed += result.closed.len();
                }
            }
            info!(%kind, %effective_from, "loaded rule version");
            report.inserted += 1;
        }

        Ok(report)
    }
}

fn build_version(
    kind: TaxKind,
    effective_from: NaiveDate,
    rows: &[&RuleVersionRecord],
) -> Result<NewTaxRuleVersion, RuleLoaderError> {
    let invalid = |reason: String| RuleLoaderError::InvalidVersion {
        kind,
        effective_from,
        reason,
    };
    let first = rows
        .first()
        .ok_or_else(|| invalid("no rows".to_string()))?;

    let band_bounds = |row: &RuleVersionRecord| {
        row.lower_bound
            .ok_or_else(|| invalid("lower_bound is required for every band".to_string()))
    };

    let parameters = match kind.shape() {
        RateShape::Graduated => {
            let personal_relief = first
                .personal_relief
                .ok_or_else(|| invalid("personal_relief is required".to_string()))?;
            let insurance_relief = match (first.insurance_relief_rate, first.insurance_relief_max) {
                (Some(rate), Some(max_amount)) => Some(InsuranceRelief { rate, max_amount }),
                (None, None) => None,
                _ => {
                    return Err(invalid(
                        "insurance_relief_rate and insurance_relief_max go together".to_string(),
                    ));
                }
            };
            let brackets = rows
                .iter()
                .map(|row| {
                    Ok(Bracket {
                        lower_bound: band_bounds(*row)?,
                        upper_bound: row.upper_bound,
                        rate: row.rate,
                    })
                })
                .collect::<Result<Vec<_>, RuleLoaderError>>()?;
            RuleParameters::Graduated(GraduatedParameters {
                brackets,
                personal_relief,
                insurance_relief,
            })
        }
        RateShape::Tiered => {
            let tiers = rows
                .iter()
                .map(|row| {
                    Ok(TierBand {
                        label: row.label.clone().unwrap_or_default(),
                        salary_range_low: band_bounds(*row)?,
                        salary_range_high: row.upper_bound,
                        rate: row.rate,
                    })
                })
                .collect::<Result<Vec<_>, RuleLoaderError>>()?;
            RuleParameters::Tiered(TieredParameters { tiers })
        }
        RateShape::Percentage => {
            if rows.len() != 1 {
                return Err(invalid(format!(
                    "percentage rules take exactly one row, found {}",
                    rows.len()
                )));
            }
            RuleParameters::Percentage(PercentageParameters {
                rate: first.rate,
                min_amount: first.min_amount,
                max_amount: first.max_amount,
            })
        }
    };

    let version = NewTaxRuleVersion {
        kind,
        effective_from,
        effective_to: first.effective_to,
        is_active: true,
        parameters,
        notes: first.notes.clone().filter(|n| !n.is_empty()),
    };
    version.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use payroll_core::db::InMemoryRuleStore;
    use rust_decimal_macros::dec;

    use super::*;

    const HEADER: &str = "tax_kind,effective_from,effective_to,label,lower_bound,upper_bound,rate,min_amount,max_amount,personal_relief,insurance_relief_rate,insurance_relief_max,notes\n";

    fn parse_rows(rows: &str) -> Vec<RuleVersionRecord> {
        RuleVersionLoader::parse(format!("{HEADER}{rows}").as_bytes()).unwrap()
    }

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // parse tests

    #[test]
    fn parse_reads_optional_columns_as_none() {
        let records = parse_rows("HOUSING_LEVY,2024-03-19,,,,,0.015,,,,,,\n");

        assert_eq!(
            records,
            vec![RuleVersionRecord {
                tax_kind: "HOUSING_LEVY".to_string(),
                effective_from: date(2024, 3, 19),
                effective_to: None,
                label: None,
                lower_bound: None,
                upper_bound: None,
                rate: dec!(0.015),
                min_amount: None,
                max_amount: None,
                personal_relief: None,
                insurance_relief_rate: None,
                insurance_relief_max: None,
                notes: None,
            }]
        );
    }

    #[test]
    fn parse_rejects_malformed_decimal() {
        let result =
            RuleVersionLoader::parse(format!("{HEADER}SHIF,2024-10-01,,,,,abc,,,,,,\n").as_bytes());

        assert!(matches!(result, Err(RuleLoaderError::CsvParse(_))));
    }

    // build tests

    #[test]
    fn build_groups_bands_into_one_version() {
        let records = parse_rows(
            "PAYE,2023-07-01,,,0,24000,0.10,,,2400,0.15,5000,\n\
             PAYE,2023-07-01,,,24001,32333,0.25,,,,,,\n\
             PAYE,2023-07-01,,,32334,,0.30,,,,,,\n",
        );

        let versions = RuleVersionLoader::build(&records).unwrap();

        assert_eq!(versions.len(), 1);
        match &versions[0].parameters {
            RuleParameters::Graduated(params) => {
                assert_eq!(params.brackets.len(), 3);
                assert_eq!(params.personal_relief, dec!(2400));
                assert_eq!(
                    params.insurance_relief,
                    Some(InsuranceRelief {
                        rate: dec!(0.15),
                        max_amount: dec!(5000),
                    })
                );
            }
            other => panic!("expected graduated parameters, got {other:?}"),
        }
    }

    #[test]
    fn build_rejects_unknown_kind() {
        let records = parse_rows("NHIF,2020-01-01,,,,,0.02,,,,,,\n");

        let result = RuleVersionLoader::build(&records);

        assert!(matches!(result, Err(RuleLoaderError::UnknownKind(kind)) if kind == "NHIF"));
    }

    #[test]
    fn build_rejects_two_percentage_rows() {
        let records = parse_rows(
            "SHIF,2024-10-01,,,,,0.0275,300,,,,,\n\
             SHIF,2024-10-01,,,,,0.03,,,,,,\n",
        );

        let result = RuleVersionLoader::build(&records);

        assert!(matches!(result, Err(RuleLoaderError::InvalidVersion { .. })));
    }

    #[test]
    fn build_rejects_non_contiguous_tiers() {
        let records = parse_rows(
            "NSSF_TIER1,2025-02-01,,Tier I,0,8000,0.06,,,,,,\n\
             NSSF_TIER1,2025-02-01,,Tier Ib,9000,10000,0.06,,,,,,\n",
        );

        let result = RuleVersionLoader::build(&records);

        assert!(matches!(
            result,
            Err(RuleLoaderError::InvalidVersion { kind: TaxKind::PensionTier1, .. })
        ));
    }

    #[test]
    fn build_requires_personal_relief_for_income_tax() {
        let records = parse_rows("PAYE,2023-07-01,,,0,,0.10,,,,,,\n");

        let result = RuleVersionLoader::build(&records);

        assert!(matches!(
            result,
            Err(RuleLoaderError::InvalidVersion { reason, .. }) if reason == "personal_relief is required"
        ));
    }

    // load tests

    #[tokio::test]
    async fn load_skips_existing_versions() {
        let store = InMemoryRuleStore::new();
        let records = parse_rows("HOUSING_LEVY,2024-03-19,,,,,0.015,,,,,,\n");

        let first = RuleVersionLoader::load(&store, &records, LoadMode::Append).await.unwrap();
        let second = RuleVersionLoader::load(&store, &records, LoadMode::Append).await.unwrap();

        assert_eq!(first, LoadReport { inserted: 1, skipped: 0, closed: 0 });
        assert_eq!(second, LoadReport { inserted: 0, skipped: 1, closed: 0 });
    }

    #[tokio::test]
    async fn load_in_supersede_mode_closes_predecessor() {
        let store = InMemoryRuleStore::new();
        let records = parse_rows(
            "SHIF,2024-01-01,,,,,0.0275,,,,,,\n\
             SHIF,2024-10-01,,,,,0.0275,300,,,,,\n",
        );

        let report = RuleVersionLoader::load(&store, &records, LoadMode::Supersede).await.unwrap();
        let versions = store.list_versions(TaxKind::HealthLevy).await.unwrap();

        assert_eq!(report, LoadReport { inserted: 2, skipped: 0, closed: 1 });
        assert_eq!(versions[1].effective_to, Some(date(2024, 9, 30)));
    }
}
