//! # Compliance Framework: Regulatory Tier
//!
//! The single definition of the compliance tiers a service can declare.
//! Regulated tiers raise the security posture of every component through
//! the compliance-default layer and lock mandated controls through the
//! policy layer.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ModelError;

/// Regulatory tier governing mandatory security defaults.
///
/// | Tier | Wire name | Regulated |
/// |------|-----------|-----------|
/// | Commercial | `commercial` | no |
/// | FedRAMP Moderate | `fedramp-moderate` | yes |
/// | FedRAMP High | `fedramp-high` | yes |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceFramework {
    /// No regulatory mandates beyond platform conventions.
    #[default]
    Commercial,
    /// FedRAMP Moderate baseline.
    FedrampModerate,
    /// FedRAMP High baseline.
    FedrampHigh,
}

impl ComplianceFramework {
    /// All frameworks, lowest to highest posture.
    pub fn all() -> &'static [ComplianceFramework] {
        &[Self::Commercial, Self::FedrampModerate, Self::FedrampHigh]
    }

    /// Wire identifier, as written in manifests and compliance tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commercial => "commercial",
            Self::FedrampModerate => "fedramp-moderate",
            Self::FedrampHigh => "fedramp-high",
        }
    }

    /// Returns true for tiers that carry mandatory controls.
    pub fn is_regulated(&self) -> bool {
        match self {
            Self::Commercial => false,
            Self::FedrampModerate | Self::FedrampHigh => true,
        }
    }
}

impl std::fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceFramework {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commercial" => Ok(Self::Commercial),
            "fedramp-moderate" => Ok(Self::FedrampModerate),
            "fedramp-high" => Ok(Self::FedrampHigh),
            other => Err(ModelError::UnknownComplianceFramework(other.to_string())),
        }
    }
}
