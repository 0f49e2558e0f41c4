use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RuleVersionRef;

/// Result of one deduction calculation.
///
/// Constructed fresh per call and handed to the caller, who may persist it
/// alongside a payroll record. Every amount is rounded to two decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductionBreakdown {
    pub gross_salary: Decimal,
    pub pension_tier1: Decimal,
    pub pension_tier2: Decimal,
    pub health_levy: Decimal,
    pub housing_levy: Decimal,
    /// Gross salary less both pension tiers.
    pub taxable_income: Decimal,
    /// Insurance relief applied to income tax; zero when not configured.
    pub insurance_relief: Decimal,
    pub income_tax: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,
    pub as_of_date: NaiveDate,
    pub rule_versions_used: Vec<RuleVersionRef>,
}

impl DeductionBreakdown {
    /// Combined pension contribution across both tiers.
    pub fn pension_total(&self) -> Decimal {
        self.pension_tier1 + self.pension_tier2
    }
}
