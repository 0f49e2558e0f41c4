use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use payroll_core::{
    Bracket, GraduatedParameters, InsuranceRelief, NewTaxRuleVersion, PercentageParameters,
    RateShape, RepositoryError, RuleParameters, TaxKind, TaxRuleRepository, TaxRuleVersion,
    TierBand, TieredParameters,
};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};

use crate::decimal::{decimal_to_text, get_decimal, get_optional_decimal};

const VERSION_COLUMNS: &str = "id, tax_kind, rate_shape, effective_from, effective_to, is_active,
     personal_relief, insurance_relief_rate, insurance_relief_max,
     rate, min_amount, max_amount, notes";

pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;
            tracing::debug!(file = %path.display(), "applied seed file");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_bands(
        &self,
        version_id: i64,
    ) -> Result<Vec<BandRow>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT label, lower_bound, upper_bound, rate
             FROM tax_rule_bands WHERE version_id = ? ORDER BY position",
        )
        .bind(version_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.iter().map(row_to_band).collect()
    }

    async fn hydrate(
        &self,
        rows: Vec<SqliteRow>,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        let mut versions = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row
                .try_get("id")
                .map_err(|e| RepositoryError::Database(e.to_string()))?;
            let bands = self.load_bands(id).await?;
            versions.push(row_to_version(row, bands)?);
        }
        Ok(versions)
    }
}

/// A bracket or tier as stored, before it is shaped for its parameters.
struct BandRow {
    label: Option<String>,
    lower_bound: rust_decimal::Decimal,
    upper_bound: Option<rust_decimal::Decimal>,
    rate: rust_decimal::Decimal,
}

fn row_to_band(row: &SqliteRow) -> Result<BandRow, RepositoryError> {
    Ok(BandRow {
        label: row
            .try_get("label")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        lower_bound: get_decimal(row, "lower_bound")?,
        upper_bound: get_optional_decimal(row, "upper_bound")?,
        rate: get_decimal(row, "rate")?,
    })
}

fn row_to_version(
    row: &SqliteRow,
    bands: Vec<BandRow>,
) -> Result<TaxRuleVersion, RepositoryError> {
    let kind_code: String = row
        .try_get("tax_kind")
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
    let kind = TaxKind::parse(&kind_code)
        .ok_or_else(|| RepositoryError::InvalidRecord(format!("unknown tax kind '{kind_code}'")))?;

    let shape_code: String = row
        .try_get("rate_shape")
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
    let shape = RateShape::parse(&shape_code)
        .ok_or_else(|| RepositoryError::InvalidRecord(format!("unknown rate shape '{shape_code}'")))?;

    let parameters = match shape {
        RateShape::Graduated => {
            let relief_rate = get_optional_decimal(row, "insurance_relief_rate")?;
            let relief_max = get_optional_decimal(row, "insurance_relief_max")?;
            RuleParameters::Graduated(GraduatedParameters {
                brackets: bands
                    .into_iter()
                    .map(|band| Bracket {
                        lower_bound: band.lower_bound,
                        upper_bound: band.upper_bound,
                        rate: band.rate,
                    })
                    .collect(),
                personal_relief: get_decimal(row, "personal_relief")?,
                insurance_relief: match (relief_rate, relief_max) {
                    (Some(rate), Some(max_amount)) => Some(InsuranceRelief { rate, max_amount }),
                    _ => None,
                },
            })
        }
        RateShape::Tiered => RuleParameters::Tiered(TieredParameters {
            tiers: bands
                .into_iter()
                .map(|band| TierBand {
                    label: band.label.unwrap_or_default(),
                    salary_range_low: band.lower_bound,
                    salary_range_high: band.upper_bound,
                    rate: band.rate,
                })
                .collect(),
        }),
        RateShape::Percentage => RuleParameters::Percentage(PercentageParameters {
            rate: get_decimal(row, "rate")?,
            min_amount: get_optional_decimal(row, "min_amount")?,
            max_amount: get_optional_decimal(row, "max_amount")?,
        }),
    };

    // Rows can be written around `insert_version`; refuse to hand back a
    // rule that would compute with a wrong rate.
    if kind.shape() != shape {
        return Err(RepositoryError::InvalidRecord(format!(
            "{kind} stored with rate shape {shape}, expected {}",
            kind.shape()
        )));
    }
    parameters
        .validate()
        .map_err(|e| RepositoryError::InvalidRecord(format!("stored {kind} rule: {e}")))?;

    Ok(TaxRuleVersion {
        id: row
            .try_get("id")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        kind,
        effective_from: row
            .try_get::<NaiveDate, _>("effective_from")
            .map_err(|e| RepositoryError::Database(format!("Failed to get effective_from: {}", e)))?,
        effective_to: row
            .try_get::<Option<NaiveDate>, _>("effective_to")
            .map_err(|e| RepositoryError::Database(format!("Failed to get effective_to: {}", e)))?,
        is_active: row
            .try_get("is_active")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
        parameters,
        notes: row
            .try_get("notes")
            .map_err(|e| RepositoryError::Database(e.to_string()))?,
    })
}

async fn insert_bands(
    tx: &mut Transaction<'_, Sqlite>,
    version_id: i64,
    bands: Vec<BandRow>,
) -> Result<(), RepositoryError> {
    for (position, band) in bands.into_iter().enumerate() {
        sqlx::query(
            "INSERT INTO tax_rule_bands (version_id, position, label, lower_bound, upper_bound, rate)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(version_id)
        .bind(position as i64)
        .bind(band.label)
        .bind(decimal_to_text(band.lower_bound))
        .bind(band.upper_bound.map(decimal_to_text))
        .bind(decimal_to_text(band.rate))
        .execute(&mut **tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;
    }
    Ok(())
}

#[async_trait]
impl TaxRuleRepository for SqliteRuleRepository {
    async fn find_active_configs(
        &self,
        kind: TaxKind,
        date: NaiveDate,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS}
             FROM tax_rule_versions
             WHERE tax_kind = ? AND is_active = 1
               AND effective_from <= ?
               AND (effective_to IS NULL OR effective_to >= ?)
             ORDER BY effective_from DESC, id DESC"
        ))
        .bind(kind.as_str())
        .bind(date)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        self.hydrate(rows).await
    }

    async fn get_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS} FROM tax_rule_versions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?
        .ok_or(RepositoryError::NotFound)?;

        let bands = self.load_bands(id).await?;
        row_to_version(&row, bands)
    }

    async fn list_versions(
        &self,
        kind: TaxKind,
    ) -> Result<Vec<TaxRuleVersion>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {VERSION_COLUMNS}
             FROM tax_rule_versions
             WHERE tax_kind = ?
             ORDER BY effective_from DESC, id DESC"
        ))
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        self.hydrate(rows).await
    }

    async fn insert_version(
        &self,
        version: NewTaxRuleVersion,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        version
            .validate()
            .map_err(|e| RepositoryError::InvalidRecord(e.to_string()))?;

        let mut personal_relief = None;
        let mut relief_rate = None;
        let mut relief_max = None;
        let mut rate = None;
        let mut min_amount = None;
        let mut max_amount = None;
        let bands = match &version.parameters {
            RuleParameters::Graduated(params) => {
                personal_relief = Some(decimal_to_text(params.personal_relief));
                if let Some(relief) = &params.insurance_relief {
                    relief_rate = Some(decimal_to_text(relief.rate));
                    relief_max = Some(decimal_to_text(relief.max_amount));
                }
                params
                    .brackets
                    .iter()
                    .map(|b| BandRow {
                        label: None,
                        lower_bound: b.lower_bound,
                        upper_bound: b.upper_bound,
                        rate: b.rate,
                    })
                    .collect()
            }
            RuleParameters::Tiered(params) => params
                .tiers
                .iter()
                .map(|t| BandRow {
                    label: Some(t.label.clone()),
                    lower_bound: t.salary_range_low,
                    upper_bound: t.salary_range_high,
                    rate: t.rate,
                })
                .collect(),
            RuleParameters::Percentage(params) => {
                rate = Some(decimal_to_text(params.rate));
                min_amount = params.min_amount.map(decimal_to_text);
                max_amount = params.max_amount.map(decimal_to_text);
                Vec::new()
            }
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO tax_rule_versions (
                tax_kind, rate_shape, effective_from, effective_to, is_active,
                personal_relief, insurance_relief_rate, insurance_relief_max,
                rate, min_amount, max_amount, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(version.kind.as_str())
        .bind(version.parameters.shape().as_str())
        .bind(version.effective_from)
        .bind(version.effective_to)
        .bind(version.is_active)
        .bind(personal_relief)
        .bind(relief_rate)
        .bind(relief_max)
        .bind(rate)
        .bind(min_amount)
        .bind(max_amount)
        .bind(version.notes.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        let id = result.last_insert_rowid();
        insert_bands(&mut tx, id, bands).await?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        tracing::debug!(id, kind = %version.kind, effective_from = %version.effective_from, "inserted rule version");
        Ok(version.with_id(id))
    }

    async fn close_version(
        &self,
        id: i64,
        effective_to: NaiveDate,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        let existing = self.get_version(id).await?;
        if effective_to < existing.effective_from {
            return Err(RepositoryError::InvalidRecord(format!(
                "effective_to {effective_to} is before effective_from {}",
                existing.effective_from
            )));
        }

        sqlx::query("UPDATE tax_rule_versions SET effective_to = ? WHERE id = ?")
            .bind(effective_to)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        self.get_version(id).await
    }

    async fn deactivate_version(
        &self,
        id: i64,
    ) -> Result<TaxRuleVersion, RepositoryError> {
        let result = sqlx::query("UPDATE tax_rule_versions SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_version(id).await
    }
}
