use std::fmt;

use serde::{Deserialize, Serialize};

/// The statutory deductions the engine knows how to compute.
///
/// The stored codes (`as_str`) match the codes used by the revenue authority
/// and the pension and health funds on payslips and remittance files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxKind {
    /// Pay As You Earn income tax.
    #[serde(rename = "PAYE")]
    IncomeTax,
    /// NSSF tier I pension contribution.
    #[serde(rename = "NSSF_TIER1")]
    PensionTier1,
    /// NSSF tier II pension contribution.
    #[serde(rename = "NSSF_TIER2")]
    PensionTier2,
    /// Social Health Insurance Fund levy.
    #[serde(rename = "SHIF")]
    HealthLevy,
    /// Affordable housing levy.
    #[serde(rename = "HOUSING_LEVY")]
    HousingLevy,
}

impl TaxKind {
    /// Every kind, in the order the orchestrator resolves them.
    pub const ALL: [TaxKind; 5] = [
        TaxKind::IncomeTax,
        TaxKind::PensionTier1,
        TaxKind::PensionTier2,
        TaxKind::HealthLevy,
        TaxKind::HousingLevy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IncomeTax => "PAYE",
            Self::PensionTier1 => "NSSF_TIER1",
            Self::PensionTier2 => "NSSF_TIER2",
            Self::HealthLevy => "SHIF",
            Self::HousingLevy => "HOUSING_LEVY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYE" => Some(Self::IncomeTax),
            "NSSF_TIER1" => Some(Self::PensionTier1),
            "NSSF_TIER2" => Some(Self::PensionTier2),
            "SHIF" => Some(Self::HealthLevy),
            "HOUSING_LEVY" => Some(Self::HousingLevy),
            _ => None,
        }
    }

    /// The only parameter shape a version of this kind may carry.
    pub fn shape(&self) -> RateShape {
        match self {
            Self::IncomeTax => RateShape::Graduated,
            Self::PensionTier1 | Self::PensionTier2 => RateShape::Tiered,
            Self::HealthLevy | Self::HousingLevy => RateShape::Percentage,
        }
    }
}

impl fmt::Display for TaxKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determines which calculator consumes a rule version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateShape {
    Graduated,
    Tiered,
    Percentage,
}

impl RateShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Graduated => "GRADUATED",
            Self::Tiered => "TIERED",
            Self::Percentage => "PERCENTAGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GRADUATED" => Some(Self::Graduated),
            "TIERED" => Some(Self::Tiered),
            "PERCENTAGE" => Some(Self::Percentage),
            _ => None,
        }
    }
}

impl fmt::Display for RateShape {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
