use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::{graduated, percentage, tiered};
use crate::error::InvalidInputError;

use super::{RateShape, TaxKind};

/// One band of a graduated income tax table.
///
/// Bounds are inclusive whole-currency amounts as published, so a table
/// reads `0..=24000`, `24001..=32333`, and so on. `upper_bound` is `None`
/// for the open top band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub lower_bound: Decimal,
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

/// Relief granted on insurance premiums, on top of personal relief.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceRelief {
    /// Share of premiums paid that is relieved (e.g. `0.15`).
    pub rate: Decimal,
    /// Cap on the relief per pay period.
    pub max_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraduatedParameters {
    pub brackets: Vec<Bracket>,
    /// Flat amount subtracted from bracket tax.
    pub personal_relief: Decimal,
    pub insurance_relief: Option<InsuranceRelief>,
}

/// One salary range of a tiered contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBand {
    pub label: String,
    pub salary_range_low: Decimal,
    pub salary_range_high: Option<Decimal>,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieredParameters {
    pub tiers: Vec<TierBand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageParameters {
    pub rate: Decimal,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

/// Shape-specific payload of a rule version. The variant is the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "parameters", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleParameters {
    Graduated(GraduatedParameters),
    Tiered(TieredParameters),
    Percentage(PercentageParameters),
}

impl RuleParameters {
    pub fn shape(&self) -> RateShape {
        match self {
            Self::Graduated(_) => RateShape::Graduated,
            Self::Tiered(_) => RateShape::Tiered,
            Self::Percentage(_) => RateShape::Percentage,
        }
    }

    /// Checks the table or limits against the rules its calculator enforces.
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        match self {
            Self::Graduated(params) => {
                graduated::validate_brackets(&params.brackets)?;
                non_negative("personal_relief", params.personal_relief)?;
                if let Some(relief) = &params.insurance_relief {
                    percentage::validate_rate(relief.rate)?;
                    non_negative("insurance relief max_amount", relief.max_amount)?;
                }
                Ok(())
            }
            Self::Tiered(params) => tiered::validate_tiers(&params.tiers),
            Self::Percentage(params) => percentage::validate_limits(
                params.rate,
                params.min_amount,
                params.max_amount,
            ),
        }
    }
}

fn non_negative(
    field: &'static str,
    value: Decimal,
) -> Result<(), InvalidInputError> {
    if value < Decimal::ZERO {
        return Err(InvalidInputError::NegativeAmount { field, value });
    }
    Ok(())
}

/// A stored, effective-dated rule record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRuleVersion {
    pub id: i64,
    pub kind: TaxKind,
    /// Inclusive.
    pub effective_from: NaiveDate,
    /// Inclusive; `None` is open-ended.
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub parameters: RuleParameters,
    pub notes: Option<String>,
}

impl TaxRuleVersion {
    pub fn shape(&self) -> RateShape {
        self.parameters.shape()
    }

    /// True when the version is switched on and its date range covers `date`.
    pub fn applies_on(
        &self,
        date: NaiveDate,
    ) -> bool {
        self.is_active
            && self.effective_from <= date
            && self.effective_to.is_none_or(|to| to >= date)
    }

    pub fn reference(&self) -> RuleVersionRef {
        RuleVersionRef {
            id: self.id,
            kind: self.kind,
            effective_from: self.effective_from,
        }
    }
}

/// For inserting new versions (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxRuleVersion {
    pub kind: TaxKind,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_active: bool,
    pub parameters: RuleParameters,
    pub notes: Option<String>,
}

impl NewTaxRuleVersion {
    /// Validates the version before it reaches a store.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInputError`] if:
    /// - the parameter shape does not belong to `kind`
    /// - `effective_to` is before `effective_from`
    /// - the parameter table or limits are invalid
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        let expected = self.kind.shape();
        let found = self.parameters.shape();
        if expected != found {
            return Err(InvalidInputError::ShapeMismatch {
                kind: self.kind,
                expected,
                found,
            });
        }
        if let Some(to) = self.effective_to {
            if to < self.effective_from {
                return Err(InvalidInputError::InvalidEffectiveRange {
                    from: self.effective_from,
                    to,
                });
            }
        }
        self.parameters.validate()
    }

    /// Attaches a store-assigned id.
    pub fn with_id(
        self,
        id: i64,
    ) -> TaxRuleVersion {
        TaxRuleVersion {
            id,
            kind: self.kind,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
            is_active: self.is_active,
            parameters: self.parameters,
            notes: self.notes,
        }
    }
}

/// Identifies a rule version that contributed to a breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVersionRef {
    pub id: i64,
    pub kind: TaxKind,
    pub effective_from: NaiveDate,
}
