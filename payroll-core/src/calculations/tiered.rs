//! Tiered pension contributions (NSSF).
//!
//! Each tier charges its rate on the part of gross salary that falls inside
//! the tier's salary range. Tiers are stored as separate rule versions, one
//! per tier kind, so a single table may start above zero: tier II begins
//! where tier I ends. The upper bound of the last range doubles as the
//! contribution cap.

use rust_decimal::Decimal;

use crate::calculations::common::{ensure_contiguous, range_floor, round_half_up, slice_within};
use crate::calculations::percentage::validate_rate;
use crate::error::InvalidInputError;
use crate::models::{TierBand, TieredParameters};

/// Checks that tiers ascend contiguously and only the last is open-ended.
///
/// # Errors
///
/// Returns [`InvalidInputError`] if:
/// - the table is empty
/// - a tier has a negative lower bound, is inverted, or has a rate outside `[0, 1]`
/// - a tier other than the last is unbounded
/// - a tier does not start one unit above the previous upper bound
pub fn validate_tiers(tiers: &[TierBand]) -> Result<(), InvalidInputError> {
    if tiers.is_empty() {
        return Err(InvalidInputError::EmptyTable);
    }

    for (index, tier) in tiers.iter().enumerate() {
        validate_rate(tier.rate)?;
        if tier.salary_range_low < Decimal::ZERO {
            return Err(InvalidInputError::NegativeAmount {
                field: "salary_range_low",
                value: tier.salary_range_low,
            });
        }

        match tier.salary_range_high {
            Some(high) if high < tier.salary_range_low => {
                return Err(InvalidInputError::InvertedRange {
                    lower: tier.salary_range_low,
                    upper: high,
                });
            }
            None if index + 1 < tiers.len() => {
                return Err(InvalidInputError::UnboundedRangeNotLast {
                    lower: tier.salary_range_low,
                });
            }
            _ => {}
        }
    }

    for pair in tiers.windows(2) {
        if let Some(previous_upper) = pair[0].salary_range_high {
            ensure_contiguous(previous_upper, pair[1].salary_range_low)?;
        }
    }

    Ok(())
}

/// Computes the contribution on `gross_salary` across all tiers.
///
/// Salary at or below the first tier's floor contributes nothing.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::tiered::compute_tiered;
/// use payroll_core::TierBand;
///
/// let tier_two = vec![TierBand {
///     label: "Tier II".to_string(),
///     salary_range_low: dec!(8001),
///     salary_range_high: Some(dec!(72000)),
///     rate: dec!(0.06),
/// }];
///
/// assert_eq!(compute_tiered(dec!(50000), &tier_two), Ok(dec!(2520.00)));
/// ```
pub fn compute_tiered(
    gross_salary: Decimal,
    tiers: &[TierBand],
) -> Result<Decimal, InvalidInputError> {
    validate_tiers(tiers)?;

    if gross_salary <= Decimal::ZERO {
        return Ok(round_half_up(Decimal::ZERO));
    }

    let contribution: Decimal = tiers
        .iter()
        .map(|tier| {
            let floor = range_floor(tier.salary_range_low);
            slice_within(gross_salary, floor, tier.salary_range_high) * tier.rate
        })
        .sum();

    Ok(round_half_up(contribution))
}

impl TieredParameters {
    pub fn compute(
        &self,
        gross_salary: Decimal,
    ) -> Result<Decimal, InvalidInputError> {
        compute_tiered(gross_salary, &self.tiers)
    }

    /// Largest contribution these tiers can produce, or `None` when the top
    /// tier is unbounded.
    pub fn maximum_contribution(&self) -> Option<Decimal> {
        let mut total = Decimal::ZERO;
        for tier in &self.tiers {
            let high = tier.salary_range_high?;
            total += (high - range_floor(tier.salary_range_low)) * tier.rate;
        }
        Some(round_half_up(total))
    }
}
