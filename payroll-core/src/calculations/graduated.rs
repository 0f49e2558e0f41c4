//! Progressive income tax (PAYE) over a graduated bracket table.
//!
//! # Algorithm
//!
//! | Step | Description |
//! |------|-------------|
//! | 1    | Taxable amount of zero or less yields zero; no bracket is read |
//! | 2    | Each bracket taxes the slice above its floor, up to its upper bound |
//! | 3    | Bracket tax is summed without intermediate rounding |
//! | 4    | Personal relief and any insurance relief are subtracted |
//! | 5    | The result is floored at zero and rounded half-up once |
//!
//! Bracket bounds are inclusive whole-currency amounts, so the floor of
//! `24001..=32333` is 24000 (see [`range_floor`]).
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use payroll_core::calculations::graduated::compute_graduated;
//! use payroll_core::{Bracket, GraduatedParameters};
//!
//! let params = GraduatedParameters {
//!     brackets: vec![
//!         Bracket { lower_bound: dec!(0), upper_bound: Some(dec!(24000)), rate: dec!(0.10) },
//!         Bracket { lower_bound: dec!(24001), upper_bound: Some(dec!(32333)), rate: dec!(0.25) },
//!         Bracket { lower_bound: dec!(32334), upper_bound: None, rate: dec!(0.30) },
//!     ],
//!     personal_relief: dec!(2400),
//!     insurance_relief: None,
//! };
//!
//! let tax = compute_graduated(dec!(40000), &params, dec!(0)).unwrap();
//!
//! // 2400 + 2083.25 + 2300.10 - 2400
//! assert_eq!(tax, dec!(4383.35));
//! ```

use rust_decimal::Decimal;

use crate::calculations::common::{
    ensure_contiguous, max, range_floor, round_half_up, slice_within,
};
use crate::calculations::percentage::validate_rate;
use crate::error::InvalidInputError;
use crate::models::{Bracket, GraduatedParameters};

/// Checks that brackets start at zero, ascend contiguously, and that only the
/// last one is open-ended.
///
/// # Errors
///
/// Returns [`InvalidInputError`] if:
/// - the table is empty
/// - the first bracket does not start at zero
/// - a bracket is inverted or has a rate outside `[0, 1]`
/// - a bracket other than the last is unbounded
/// - a bracket does not start one unit above the previous upper bound
pub fn validate_brackets(brackets: &[Bracket]) -> Result<(), InvalidInputError> {
    let first = brackets.first().ok_or(InvalidInputError::EmptyTable)?;
    if first.lower_bound != Decimal::ZERO {
        return Err(InvalidInputError::BracketsMustStartAtZero(first.lower_bound));
    }

    for (index, bracket) in brackets.iter().enumerate() {
        validate_rate(bracket.rate)?;

        match bracket.upper_bound {
            Some(upper) if upper < bracket.lower_bound => {
                return Err(InvalidInputError::InvertedRange {
                    lower: bracket.lower_bound,
                    upper,
                });
            }
            None if index + 1 < brackets.len() => {
                return Err(InvalidInputError::UnboundedRangeNotLast {
                    lower: bracket.lower_bound,
                });
            }
            _ => {}
        }
    }

    for pair in brackets.windows(2) {
        if let Some(previous_upper) = pair[0].upper_bound {
            ensure_contiguous(previous_upper, pair[1].lower_bound)?;
        }
    }

    Ok(())
}

/// Sum of marginal tax across the brackets, before relief and unrounded.
///
/// # Errors
///
/// Returns [`InvalidInputError`] if the table fails [`validate_brackets`].
pub fn bracket_tax(
    taxable_amount: Decimal,
    brackets: &[Bracket],
) -> Result<Decimal, InvalidInputError> {
    validate_brackets(brackets)?;

    if taxable_amount <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let mut tax = Decimal::ZERO;
    for bracket in brackets {
        let floor = range_floor(bracket.lower_bound);
        if taxable_amount <= floor {
            break;
        }
        tax += slice_within(taxable_amount, floor, bracket.upper_bound) * bracket.rate;
    }

    Ok(tax)
}

/// Insurance relief for the period: premiums times the relief rate, capped.
/// Zero when the rule version carries no insurance relief.
pub fn insurance_relief(
    params: &GraduatedParameters,
    insurance_premiums: Decimal,
) -> Decimal {
    match &params.insurance_relief {
        Some(relief) if insurance_premiums > Decimal::ZERO => {
            round_half_up((insurance_premiums * relief.rate).min(relief.max_amount))
        }
        _ => round_half_up(Decimal::ZERO),
    }
}

/// Computes income tax after relief.
///
/// # Errors
///
/// Returns [`InvalidInputError`] if:
/// - the bracket table is invalid
/// - `insurance_premiums` is negative
pub fn compute_graduated(
    taxable_amount: Decimal,
    params: &GraduatedParameters,
    insurance_premiums: Decimal,
) -> Result<Decimal, InvalidInputError> {
    if insurance_premiums < Decimal::ZERO {
        return Err(InvalidInputError::NegativePremiums(insurance_premiums));
    }

    let gross_tax = bracket_tax(taxable_amount, &params.brackets)?;
    let relief = params.personal_relief + insurance_relief(params, insurance_premiums);

    Ok(round_half_up(max(gross_tax - relief, Decimal::ZERO)))
}
