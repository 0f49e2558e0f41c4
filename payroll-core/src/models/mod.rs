mod deduction_breakdown;
mod rule_version;
mod tax_kind;

pub use deduction_breakdown::DeductionBreakdown;
pub use rule_version::{
    Bracket, GraduatedParameters, InsuranceRelief, NewTaxRuleVersion, PercentageParameters,
    RuleParameters, RuleVersionRef, TaxRuleVersion, TierBand, TieredParameters,
};
pub use tax_kind::{RateShape, TaxKind};
