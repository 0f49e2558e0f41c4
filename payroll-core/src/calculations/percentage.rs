//! Flat-rate levies with an optional floor and ceiling (SHIF, housing levy).
//!
//! The raw amount is `base × rate`. A configured minimum is applied first,
//! then a configured maximum, then the result is rounded half-up once. A base
//! of zero or less always yields zero: a worker with no pay owes no levy even
//! when the levy has a minimum.

use rust_decimal::Decimal;

use crate::calculations::common::{max, round_half_up};
use crate::error::InvalidInputError;
use crate::models::PercentageParameters;

/// Checks that a rate is a fraction in `[0, 1]`.
pub fn validate_rate(rate: Decimal) -> Result<(), InvalidInputError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(InvalidInputError::InvalidRate(rate));
    }
    Ok(())
}

/// Checks a percentage rule's rate and limits.
///
/// # Errors
///
/// Returns [`InvalidInputError`] if:
/// - `rate` is outside `[0, 1]`
/// - either limit is negative
/// - `min_amount` exceeds `max_amount`
pub fn validate_limits(
    rate: Decimal,
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
) -> Result<(), InvalidInputError> {
    validate_rate(rate)?;
    if let Some(min) = min_amount {
        if min < Decimal::ZERO {
            return Err(InvalidInputError::NegativeAmount {
                field: "min_amount",
                value: min,
            });
        }
    }
    if let Some(max) = max_amount {
        if max < Decimal::ZERO {
            return Err(InvalidInputError::NegativeAmount {
                field: "max_amount",
                value: max,
            });
        }
    }
    if let (Some(min), Some(max)) = (min_amount, max_amount) {
        if min > max {
            return Err(InvalidInputError::InvertedLimits { min, max });
        }
    }
    Ok(())
}

/// Computes `base × rate`, floored at `min_amount` then capped at `max_amount`.
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::percentage::compute_percentage;
///
/// // SHIF: 2.75% with a KES 300 minimum
/// assert_eq!(compute_percentage(dec!(5000), dec!(0.0275), Some(dec!(300)), None), Ok(dec!(300)));
/// assert_eq!(compute_percentage(dec!(50000), dec!(0.0275), Some(dec!(300)), None), Ok(dec!(1375.00)));
/// ```
pub fn compute_percentage(
    base_amount: Decimal,
    rate: Decimal,
    min_amount: Option<Decimal>,
    max_amount: Option<Decimal>,
) -> Result<Decimal, InvalidInputError> {
    validate_limits(rate, min_amount, max_amount)?;

    if base_amount <= Decimal::ZERO {
        return Ok(round_half_up(Decimal::ZERO));
    }

    let mut amount = base_amount * rate;
    if let Some(min) = min_amount {
        amount = max(amount, min);
    }
    if let Some(max) = max_amount {
        amount = amount.min(max);
    }

    Ok(round_half_up(amount))
}

impl PercentageParameters {
    /// Applies these parameters to `base_amount`.
    pub fn compute(
        &self,
        base_amount: Decimal,
    ) -> Result<Decimal, InvalidInputError> {
        compute_percentage(base_amount, self.rate, self.min_amount, self.max_amount)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn raw_amount_when_uncapped() {
        let result = compute_percentage(dec!(50000), dec!(0.015), None, None);

        assert_eq!(result, Ok(dec!(750.00)));
    }

    #[test]
    fn minimum_applies_when_raw_is_lower() {
        // 5000 * 2.75% = 137.50, below the 300 floor
        let result = compute_percentage(dec!(5000), dec!(0.0275), Some(dec!(300)), None);

        assert_eq!(result, Ok(dec!(300)));
    }

    #[test]
    fn maximum_caps_raw_amount() {
        let result = compute_percentage(dec!(1000000), dec!(0.0275), None, Some(dec!(5000)));

        assert_eq!(result, Ok(dec!(5000)));
    }

    #[test]
    fn floor_then_ceiling_when_both_present() {
        let result =
            compute_percentage(dec!(100), dec!(0.0275), Some(dec!(300)), Some(dec!(1000)));

        assert_eq!(result, Ok(dec!(300)));
    }

    #[test]
    fn floor_and_ceiling_may_be_equal() {
        let result =
            compute_percentage(dec!(80000), dec!(0.0275), Some(dec!(500)), Some(dec!(500)));

        assert_eq!(result, Ok(dec!(500)));
    }

    #[test]
    fn zero_base_yields_zero_even_with_minimum() {
        let result = compute_percentage(dec!(0), dec!(0.0275), Some(dec!(300)), None);

        assert_eq!(result, Ok(dec!(0)));
    }

    #[test]
    fn result_is_rounded_half_up() {
        // 12345.67 * 0.015 = 185.18505
        let result = compute_percentage(dec!(12345.67), dec!(0.015), None, None);

        assert_eq!(result, Ok(dec!(185.19)));
    }

    #[test]
    fn rejects_percent_number_as_rate() {
        let result = compute_percentage(dec!(5000), dec!(2.75), None, None);

        assert_eq!(result, Err(InvalidInputError::InvalidRate(dec!(2.75))));
    }

    #[test]
    fn rejects_inverted_limits() {
        let result = compute_percentage(dec!(5000), dec!(0.0275), Some(dec!(500)), Some(dec!(300)));

        assert_eq!(
            result,
            Err(InvalidInputError::InvertedLimits {
                min: dec!(500),
                max: dec!(300),
            })
        );
    }

    #[test]
    fn rejects_negative_minimum() {
        let result = compute_percentage(dec!(5000), dec!(0.0275), Some(dec!(-1)), None);

        assert_eq!(
            result,
            Err(InvalidInputError::NegativeAmount {
                field: "min_amount",
                value: dec!(-1),
            })
        );
    }

    #[test]
    fn parameters_compute_delegates() {
        let params = PercentageParameters {
            rate: dec!(0.0275),
            min_amount: Some(dec!(300)),
            max_amount: None,
        };

        assert_eq!(params.compute(dec!(50000)), Ok(dec!(1375.00)));
    }
}
