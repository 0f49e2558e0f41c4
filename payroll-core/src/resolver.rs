//! Picks the rule version in force for a kind on a date.
//!
//! The store is asked for candidates, then every candidate is re-checked
//! here: kind, kill switch, and inclusive date range. A store that returns
//! too much cannot change the outcome.
//!
//! When more than one version covers the date the data is inconsistent.
//! The latest `effective_from` wins, then the higher id, and an integrity
//! warning is logged so the overlap can be fixed at the source.

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::db::TaxRuleRepository;
use crate::engine::ResolvedRuleSet;
use crate::error::EngineError;
use crate::models::{TaxKind, TaxRuleVersion};

/// Resolves the single version of `kind` applicable on `as_of`.
///
/// # Errors
///
/// * [`EngineError::ConfigurationNotFound`] if no active version covers `as_of`.
/// * [`EngineError::Repository`] if the store read fails.
pub async fn resolve<R: TaxRuleRepository + ?Sized>(
    repo: &R,
    kind: TaxKind,
    as_of: NaiveDate,
) -> Result<TaxRuleVersion, EngineError> {
    let candidates = repo.find_active_configs(kind, as_of).await?;
    select_applicable(kind, as_of, candidates)
}

/// Resolves all five kinds for `as_of`, stopping at the first missing one.
///
/// # Errors
///
/// As [`resolve`], plus [`EngineError::InvalidInput`] when a resolved
/// version's parameters do not have its kind's shape.
pub async fn resolve_all<R: TaxRuleRepository + ?Sized>(
    repo: &R,
    as_of: NaiveDate,
) -> Result<ResolvedRuleSet, EngineError> {
    let income_tax = resolve(repo, TaxKind::IncomeTax, as_of).await?;
    let pension_tier1 = resolve(repo, TaxKind::PensionTier1, as_of).await?;
    let pension_tier2 = resolve(repo, TaxKind::PensionTier2, as_of).await?;
    let health_levy = resolve(repo, TaxKind::HealthLevy, as_of).await?;
    let housing_levy = resolve(repo, TaxKind::HousingLevy, as_of).await?;

    Ok(ResolvedRuleSet::new(
        as_of,
        income_tax,
        pension_tier1,
        pension_tier2,
        health_levy,
        housing_levy,
    )?)
}

/// Applies the resolution rules to an already-fetched candidate list.
///
/// # Errors
///
/// [`EngineError::ConfigurationNotFound`] when nothing in `candidates`
/// applies.
pub fn select_applicable(
    kind: TaxKind,
    as_of: NaiveDate,
    candidates: Vec<TaxRuleVersion>,
) -> Result<TaxRuleVersion, EngineError> {
    let applicable: Vec<TaxRuleVersion> = candidates
        .into_iter()
        .filter(|v| v.kind == kind && v.applies_on(as_of))
        .collect();

    if applicable.len() > 1 {
        let ids: Vec<i64> = applicable.iter().map(|v| v.id).collect();
        warn!(
            %kind,
            %as_of,
            candidate_ids = ?ids,
            "overlapping rule versions; using the latest effective_from"
        );
    }

    let chosen = applicable
        .into_iter()
        .max_by(|a, b| {
            a.effective_from
                .cmp(&b.effective_from)
                .then(a.id.cmp(&b.id))
        })
        .ok_or(EngineError::ConfigurationNotFound { kind, as_of })?;

    debug!(
        %kind,
        %as_of,
        id = chosen.id,
        effective_from = %chosen.effective_from,
        "resolved rule version"
    );
    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::InMemoryRuleStore;
    use crate::models::{PercentageParameters, RuleParameters};

    fn date(
        y: i32,
        m: u32,
        d: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shif(
        id: i64,
        from: NaiveDate,
        to: Option<NaiveDate>,
        min: Option<rust_decimal::Decimal>,
    ) -> TaxRuleVersion {
        TaxRuleVersion {
            id,
            kind: TaxKind::HealthLevy,
            effective_from: from,
            effective_to: to,
            is_active: true,
            parameters: RuleParameters::Percentage(PercentageParameters {
                rate: dec!(0.0275),
                min_amount: min,
                max_amount: None,
            }),
            notes: None,
        }
    }

    // =========================================================================
    // select_applicable tests
    // =========================================================================

    #[test]
    fn picks_version_covering_date() {
        let candidates = vec![
            shif(1, date(2024, 1, 1), Some(date(2024, 9, 30)), None),
            shif(2, date(2024, 10, 1), None, Some(dec!(300))),
        ];

        let result = select_applicable(TaxKind::HealthLevy, date(2024, 9, 30), candidates);

        assert_eq!(result.map(|v| v.id), Ok(1));
    }

    #[test]
    fn boundary_day_belongs_to_new_version() {
        let candidates = vec![
            shif(1, date(2024, 1, 1), Some(date(2024, 9, 30)), None),
            shif(2, date(2024, 10, 1), None, Some(dec!(300))),
        ];

        let result = select_applicable(TaxKind::HealthLevy, date(2024, 10, 1), candidates);

        assert_eq!(result.map(|v| v.id), Ok(2));
    }

    #[test]
    fn overlap_prefers_latest_effective_from() {
        let candidates = vec![
            shif(5, date(2024, 10, 1), None, Some(dec!(300))),
            shif(3, date(2024, 1, 1), None, None),
        ];

        let result = select_applicable(TaxKind::HealthLevy, date(2025, 1, 1), candidates);

        assert_eq!(result.map(|v| v.id), Ok(5));
    }

    #[test]
    fn equal_effective_from_prefers_higher_id() {
        let candidates = vec![
            shif(9, date(2024, 10, 1), None, None),
            shif(4, date(2024, 10, 1), None, Some(dec!(300))),
        ];

        let result = select_applicable(TaxKind::HealthLevy, date(2025, 1, 1), candidates);

        assert_eq!(result.map(|v| v.id), Ok(9));
    }

    #[test]
    fn refilters_what_the_store_returned() {
        let mut inactive = shif(1, date(2024, 1, 1), None, None);
        inactive.is_active = false;
        let mut wrong_kind = shif(2, date(2024, 1, 1), None, None);
        wrong_kind.kind = TaxKind::HousingLevy;
        let future = shif(3, date(2030, 1, 1), None, None);

        let result = select_applicable(
            TaxKind::HealthLevy,
            date(2025, 1, 1),
            vec![inactive, wrong_kind, future],
        );

        assert_eq!(
            result,
            Err(EngineError::ConfigurationNotFound {
                kind: TaxKind::HealthLevy,
                as_of: date(2025, 1, 1),
            })
        );
    }

    // =========================================================================
    // resolve tests
    // =========================================================================

    #[tokio::test]
    async fn resolve_before_first_version_is_not_found() {
        let store = InMemoryRuleStore::with_versions(vec![shif(1, date(2024, 10, 1), None, None)]);

        let result = resolve(&store, TaxKind::HealthLevy, date(2024, 1, 31)).await;

        assert_eq!(
            result,
            Err(EngineError::ConfigurationNotFound {
                kind: TaxKind::HealthLevy,
                as_of: date(2024, 1, 31),
            })
        );
    }

    #[tokio::test]
    async fn resolve_all_fails_on_first_missing_kind() {
        let store = InMemoryRuleStore::with_versions(vec![shif(1, date(2024, 10, 1), None, None)]);

        let result = resolve_all(&store, date(2025, 1, 1)).await;

        assert!(matches!(
            result,
            Err(EngineError::ConfigurationNotFound {
                kind: TaxKind::IncomeTax,
                ..
            })
        ));
    }
}
