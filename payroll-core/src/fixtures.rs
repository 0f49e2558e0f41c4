//! Kenyan statutory rules used across unit tests.

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::models::{
    Bracket, GraduatedParameters, InsuranceRelief, PercentageParameters, RuleParameters,
    TaxKind, TaxRuleVersion, TierBand, TieredParameters,
};

pub fn date(
    y: i32,
    m: u32,
    d: u32,
) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn version(
    id: i64,
    kind: TaxKind,
    effective_from: NaiveDate,
    parameters: RuleParameters,
) -> TaxRuleVersion {
    TaxRuleVersion {
        id,
        kind,
        effective_from,
        effective_to: None,
        is_active: true,
        parameters,
        notes: None,
    }
}

pub fn paye_2023() -> TaxRuleVersion {
    let bracket = |lower, upper, rate| Bracket {
        lower_bound: lower,
        upper_bound: upper,
        rate,
    };
    version(
        1,
        TaxKind::IncomeTax,
        date(2023, 7, 1),
        RuleParameters::Graduated(GraduatedParameters {
            brackets: vec![
                bracket(dec!(0), Some(dec!(24000)), dec!(0.10)),
                bracket(dec!(24001), Some(dec!(32333)), dec!(0.25)),
                bracket(dec!(32334), Some(dec!(500000)), dec!(0.30)),
                bracket(dec!(500001), Some(dec!(800000)), dec!(0.325)),
                bracket(dec!(800001), None, dec!(0.35)),
            ],
            personal_relief: dec!(2400),
            insurance_relief: Some(InsuranceRelief {
                rate: dec!(0.15),
                max_amount: dec!(5000),
            }),
        }),
    )
}

pub fn nssf_tier1_2025() -> TaxRuleVersion {
    version(
        2,
        TaxKind::PensionTier1,
        date(2025, 2, 1),
        RuleParameters::Tiered(TieredParameters {
            tiers: vec![TierBand {
                label: "Tier I".to_string(),
                salary_range_low: dec!(0),
                salary_range_high: Some(dec!(8000)),
                rate: dec!(0.06),
            }],
        }),
    )
}

pub fn nssf_tier2_2025() -> TaxRuleVersion {
    version(
        3,
        TaxKind::PensionTier2,
        date(2025, 2, 1),
        RuleParameters::Tiered(TieredParameters {
            tiers: vec![TierBand {
                label: "Tier II".to_string(),
                salary_range_low: dec!(8001),
                salary_range_high: Some(dec!(72000)),
                rate: dec!(0.06),
            }],
        }),
    )
}

pub fn shif_2024() -> TaxRuleVersion {
    version(
        4,
        TaxKind::HealthLevy,
        date(2024, 10, 1),
        RuleParameters::Percentage(PercentageParameters {
            rate: dec!(0.0275),
            min_amount: Some(dec!(300)),
            max_amount: None,
        }),
    )
}

pub fn housing_levy_2024() -> TaxRuleVersion {
    version(
        5,
        TaxKind::HousingLevy,
        date(2024, 3, 19),
        RuleParameters::Percentage(PercentageParameters {
            rate: dec!(0.015),
            min_amount: None,
            max_amount: None,
        }),
    )
}

/// All five kinds as in force from February 2025.
pub fn rules_2025() -> Vec<TaxRuleVersion> {
    vec![
        paye_2023(),
        nssf_tier1_2025(),
        nssf_tier2_2025(),
        shif_2024(),
        housing_levy_2024(),
    ]
}
