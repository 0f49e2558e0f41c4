//! Deduction orchestration.
//!
//! # Pipeline
//!
//! | Step | Quantity          | Calculator  | Base            |
//! |------|-------------------|-------------|-----------------|
//! | 1    | Pension tier I    | tiered      | gross           |
//! | 2    | Pension tier II   | tiered      | gross           |
//! | 3    | Taxable income    | (derived)   | gross − tiers   |
//! | 4    | Income tax        | graduated   | taxable income  |
//! | 5    | Health levy       | percentage  | gross           |
//! | 6    | Housing levy      | percentage  | gross           |
//! | 7    | Totals, net pay   | (derived)   | rounded amounts |
//!
//! [`ResolvedRuleSet`] runs the pipeline synchronously over rules already
//! fetched. [`DeductionEngine`] fetches the rules for a date and delegates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use crate::batch::{BatchRun, WorkerPay, run_batch};
use crate::calculations::common::round_half_up;
use crate::calculations::graduated::{self, compute_graduated};
use crate::db::TaxRuleRepository;
use crate::error::{EngineError, InvalidInputError};
use crate::models::{
    DeductionBreakdown, GraduatedParameters, PercentageParameters, RuleParameters,
    RuleVersionRef, TaxKind, TaxRuleVersion, TieredParameters,
};
use crate::resolver;

/// The five rule versions in force on one date, unpacked by shape.
///
/// Immutable once built, so one set can be shared by reference across
/// threads for a whole payroll run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRuleSet {
    as_of: NaiveDate,
    income_tax: GraduatedParameters,
    pension_tier1: TieredParameters,
    pension_tier2: TieredParameters,
    health_levy: PercentageParameters,
    housing_levy: PercentageParameters,
    versions_used: Vec<RuleVersionRef>,
}

impl ResolvedRuleSet {
    /// Builds a rule set from one version per kind.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] if:
    /// - a version is passed in the wrong position (`KindMismatch`)
    /// - a version's parameters are not its kind's shape (`ShapeMismatch`)
    pub fn new(
        as_of: NaiveDate,
        income_tax: TaxRuleVersion,
        pension_tier1: TaxRuleVersion,
        pension_tier2: TaxRuleVersion,
        health_levy: TaxRuleVersion,
        housing_levy: TaxRuleVersion,
    ) -> Result<Self, InvalidInputError> {
        let versions_used = vec![
            income_tax.reference(),
            pension_tier1.reference(),
            pension_tier2.reference(),
            health_levy.reference(),
            housing_levy.reference(),
        ];

        Ok(Self {
            as_of,
            income_tax: graduated_parameters(income_tax)?,
            pension_tier1: tiered_parameters(TaxKind::PensionTier1, pension_tier1)?,
            pension_tier2: tiered_parameters(TaxKind::PensionTier2, pension_tier2)?,
            health_levy: percentage_parameters(TaxKind::HealthLevy, health_levy)?,
            housing_levy: percentage_parameters(TaxKind::HousingLevy, housing_levy)?,
            versions_used,
        })
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn versions_used(&self) -> &[RuleVersionRef] {
        &self.versions_used
    }

    /// Computes the full breakdown for one gross salary.
    ///
    /// Each quantity is rounded once where it is computed; totals and net
    /// pay are exact sums and differences of those rounded amounts.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] if:
    /// - `gross_salary` or `insurance_premiums` is negative
    /// - a rule table fails its calculator's validation
    pub fn calculate(
        &self,
        gross_salary: Decimal,
        insurance_premiums: Decimal,
    ) -> Result<DeductionBreakdown, InvalidInputError> {
        check_inputs(gross_salary, insurance_premiums)?;
        let gross_salary = round_half_up(gross_salary);

        let pension_tier1 = self.pension_tier1.compute(gross_salary)?;
        let pension_tier2 = self.pension_tier2.compute(gross_salary)?;
        let taxable_income = gross_salary - pension_tier1 - pension_tier2;

        let insurance_relief = graduated::insurance_relief(&self.income_tax, insurance_premiums);
        let income_tax = compute_graduated(taxable_income, &self.income_tax, insurance_premiums)?;

        let health_levy = self.health_levy.compute(gross_salary)?;
        let housing_levy = self.housing_levy.compute(gross_salary)?;

        let total_deductions =
            pension_tier1 + pension_tier2 + income_tax + health_levy + housing_levy;
        let net_pay = gross_salary - total_deductions;

        Ok(DeductionBreakdown {
            gross_salary,
            pension_tier1,
            pension_tier2,
            health_levy,
            housing_levy,
            taxable_income,
            insurance_relief,
            income_tax,
            total_deductions,
            net_pay,
            as_of_date: self.as_of,
            rule_versions_used: self.versions_used.clone(),
        })
    }
}

fn check_inputs(
    gross_salary: Decimal,
    insurance_premiums: Decimal,
) -> Result<(), InvalidInputError> {
    if gross_salary < Decimal::ZERO {
        return Err(InvalidInputError::NegativeGrossSalary(gross_salary));
    }
    if insurance_premiums < Decimal::ZERO {
        return Err(InvalidInputError::NegativePremiums(insurance_premiums));
    }
    Ok(())
}

fn expect_kind(
    expected: TaxKind,
    version: TaxRuleVersion,
) -> Result<RuleParameters, InvalidInputError> {
    if version.kind != expected {
        return Err(InvalidInputError::KindMismatch {
            expected,
            found: version.kind,
        });
    }
    Ok(version.parameters)
}

fn shape_mismatch(
    kind: TaxKind,
    found: &RuleParameters,
) -> InvalidInputError {
    InvalidInputError::ShapeMismatch {
        kind,
        expected: kind.shape(),
        found: found.shape(),
    }
}

fn graduated_parameters(version: TaxRuleVersion) -> Result<GraduatedParameters, InvalidInputError> {
    match expect_kind(TaxKind::IncomeTax, version)? {
        RuleParameters::Graduated(params) => Ok(params),
        other => Err(shape_mismatch(TaxKind::IncomeTax, &other)),
    }
}

fn tiered_parameters(
    kind: TaxKind,
    version: TaxRuleVersion,
) -> Result<TieredParameters, InvalidInputError> {
    match expect_kind(kind, version)? {
        RuleParameters::Tiered(params) => Ok(params),
        other => Err(shape_mismatch(kind, &other)),
    }
}

fn percentage_parameters(
    kind: TaxKind,
    version: TaxRuleVersion,
) -> Result<PercentageParameters, InvalidInputError> {
    match expect_kind(kind, version)? {
        RuleParameters::Percentage(params) => Ok(params),
        other => Err(shape_mismatch(kind, &other)),
    }
}

/// Computes deductions against rules held in a [`TaxRuleRepository`].
///
/// Holds no state besides the store handle; every call resolves afresh, so
/// the same inputs against the same store always produce the same output.
#[derive(Debug, Clone)]
pub struct DeductionEngine<R> {
    repo: R,
}

impl<R: TaxRuleRepository> DeductionEngine<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Resolves the version of `kind` in force on `as_of`.
    pub async fn resolve(
        &self,
        kind: TaxKind,
        as_of: NaiveDate,
    ) -> Result<TaxRuleVersion, EngineError> {
        resolver::resolve(&self.repo, kind, as_of).await
    }

    /// Resolves all five kinds for `as_of`.
    pub async fn resolve_rule_set(
        &self,
        as_of: NaiveDate,
    ) -> Result<ResolvedRuleSet, EngineError> {
        resolver::resolve_all(&self.repo, as_of).await
    }

    /// Computes the breakdown for `gross_salary` under the rules in force on
    /// `as_of`, with no insurance premiums.
    ///
    /// # Errors
    ///
    /// * [`EngineError::InvalidInput`] for a negative gross, before the store
    ///   is read, or for a malformed rule version.
    /// * [`EngineError::ConfigurationNotFound`] for the first kind with no
    ///   version covering `as_of`.
    /// * [`EngineError::Repository`] if the store read fails.
    pub async fn calculate(
        &self,
        gross_salary: Decimal,
        as_of: NaiveDate,
    ) -> Result<DeductionBreakdown, EngineError> {
        self.calculate_with_premiums(gross_salary, as_of, Decimal::ZERO).await
    }

    /// As [`calculate`](Self::calculate), granting insurance relief on
    /// `insurance_premiums` where the income tax version configures it.
    pub async fn calculate_with_premiums(
        &self,
        gross_salary: Decimal,
        as_of: NaiveDate,
        insurance_premiums: Decimal,
    ) -> Result<DeductionBreakdown, EngineError> {
        check_inputs(gross_salary, insurance_premiums)?;

        let rule_set = self.resolve_rule_set(as_of).await?;
        let breakdown = rule_set.calculate(gross_salary, insurance_premiums)?;

        debug!(
            gross = %breakdown.gross_salary,
            %as_of,
            total_deductions = %breakdown.total_deductions,
            net_pay = %breakdown.net_pay,
            "calculated deductions"
        );
        Ok(breakdown)
    }

    /// Resolves the rules for `as_of` once, then computes every worker in
    /// parallel. Individual worker failures are reported in the run rather
    /// than failing it.
    pub async fn calculate_batch(
        &self,
        as_of: NaiveDate,
        workers: &[WorkerPay],
    ) -> Result<BatchRun, EngineError> {
        let rule_set = self.resolve_rule_set(as_of).await?;
        Ok(run_batch(&rule_set, workers))
    }
}
