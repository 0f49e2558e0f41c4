//! Common utility functions for deduction calculations.
//!
//! This module provides the rounding rule and range arithmetic shared by the
//! graduated, tiered, and percentage calculators.

use rust_decimal::Decimal;

use crate::error::InvalidInputError;

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// This follows standard financial rounding conventions where values at exactly
/// 0.005 are rounded up to 0.01 (away from zero). The result always carries a
/// scale of two so identical amounts serialize identically. Each calculator
/// applies it once, to the quantity it returns.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(137.494)), dec!(137.49));
/// assert_eq!(round_half_up(dec!(137.495)), dec!(137.50));
/// assert_eq!(round_half_up(dec!(-137.495)), dec!(-137.50)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Returns the maximum of two decimal values.
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Effective floor of a range with an inclusive whole-currency lower bound.
///
/// A published range `8001..=72000` applies to salary above 8000, so the
/// floor of any range with a positive lower bound is one unit below it.
/// A range starting at zero has a floor of zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::range_floor;
///
/// assert_eq!(range_floor(dec!(0)), dec!(0));
/// assert_eq!(range_floor(dec!(8001)), dec!(8000));
/// ```
pub fn range_floor(lower_bound: Decimal) -> Decimal {
    if lower_bound > Decimal::ZERO {
        lower_bound - Decimal::ONE
    } else {
        Decimal::ZERO
    }
}

/// Portion of `amount` falling inside a range, given its floor and optional
/// inclusive ceiling.
pub fn slice_within(
    amount: Decimal,
    floor: Decimal,
    ceiling: Option<Decimal>,
) -> Decimal {
    if amount <= floor {
        return Decimal::ZERO;
    }
    let top = match ceiling {
        Some(ceiling) => amount.min(ceiling),
        None => amount,
    };
    max(top - floor, Decimal::ZERO)
}

/// Checks that a range starts exactly one unit above the previous range's
/// inclusive upper bound.
pub fn ensure_contiguous(
    previous_upper: Decimal,
    next_lower: Decimal,
) -> Result<(), InvalidInputError> {
    if next_lower != previous_upper + Decimal::ONE {
        return Err(InvalidInputError::NonContiguousRanges {
            previous_upper,
            next_lower,
        });
    }
    Ok(())
}
