//! Error types returned by the deduction engine.
//!
//! Every failure is a logic or data error rather than a transient one, so
//! nothing here is retried. Callers decide whether one failed calculation
//! aborts a whole payroll batch or only skips that worker.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::models::{RateShape, TaxKind};

/// Input or configuration data that cannot be calculated with.
///
/// Raised before any arithmetic takes place, either when a rule version is
/// loaded or when a calculator is handed a table it cannot walk.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidInputError {
    #[error("gross salary must not be negative, got {0}")]
    NegativeGrossSalary(Decimal),

    #[error("insurance premiums must not be negative, got {0}")]
    NegativePremiums(Decimal),

    #[error("rate table has no entries")]
    EmptyTable,

    #[error("graduated brackets must start at zero, first bracket starts at {0}")]
    BracketsMustStartAtZero(Decimal),

    #[error("ranges are not contiguous: range ending at {previous_upper} is followed by one starting at {next_lower}")]
    NonContiguousRanges {
        previous_upper: Decimal,
        next_lower: Decimal,
    },

    #[error("only the last range may be unbounded, found open range starting at {lower}")]
    UnboundedRangeNotLast { lower: Decimal },

    #[error("range upper bound {upper} is below its lower bound {lower}")]
    InvertedRange { lower: Decimal, upper: Decimal },

    #[error("rate must be between 0 and 1, got {0}")]
    InvalidRate(Decimal),

    #[error("{field} must not be negative, got {value}")]
    NegativeAmount {
        field: &'static str,
        value: Decimal,
    },

    #[error("minimum amount {min} exceeds maximum amount {max}")]
    InvertedLimits { min: Decimal, max: Decimal },

    #[error("effective_to {to} is before effective_from {from}")]
    InvalidEffectiveRange { from: NaiveDate, to: NaiveDate },

    #[error("{kind} rules must be {expected}, got {found}")]
    ShapeMismatch {
        kind: TaxKind,
        expected: RateShape,
        found: RateShape,
    },

    #[error("expected a {expected} rule version, got {found}")]
    KindMismatch { expected: TaxKind, found: TaxKind },
}

/// Top-level error for a deduction calculation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// No active rule version covers the requested date.
    #[error("no active {kind} configuration covers {as_of}")]
    ConfigurationNotFound { kind: TaxKind, as_of: NaiveDate },

    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
