//! # Build Context
//!
//! The read-only, per-run inputs every component build shares. Layers 1–4
//! and 6 are derived only from the context; layer 5 only from the
//! component's own spec. Builds of different components are therefore
//! independent and may run in any order or in parallel.

use std::collections::BTreeMap;

use plinth_core::{ComplianceFramework, ServiceManifest};
use serde_json::{Map, Value};

/// Service-wide inputs to [`crate::ConfigBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildContext {
    /// Service name.
    pub service: String,
    /// Owning team.
    pub owner: String,
    /// Target environment.
    pub environment: String,
    /// Active compliance framework.
    pub compliance_framework: ComplianceFramework,
    /// `environments[environment].defaults`, empty when undeclared.
    pub environment_defaults: Map<String, Value>,
    /// Service-wide labels.
    pub service_labels: BTreeMap<String, String>,
}

impl BuildContext {
    /// Derive the context from a manifest hydrated for `environment`.
    pub fn from_manifest(manifest: &ServiceManifest, environment: &str) -> Self {
        Self {
            service: manifest.service.clone(),
            owner: manifest.owner.clone(),
            environment: environment.to_string(),
            compliance_framework: manifest.effective_compliance_framework(),
            environment_defaults: manifest
                .environment_defaults(environment)
                .cloned()
                .unwrap_or_default(),
            service_labels: manifest.labels.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn context_from_manifest() {
        let manifest: ServiceManifest = serde_json::from_value(json!({
            "service": "billing",
            "owner": "team-x",
            "complianceFramework": "fedramp-moderate",
            "labels": {"cost-center": "42"},
            "environments": {"prod": {"defaults": {"instanceType": "m5.large"}}}
        }))
        .unwrap();
        let ctx = BuildContext::from_manifest(&manifest, "prod");
        assert_eq!(ctx.compliance_framework, ComplianceFramework::FedrampModerate);
        assert_eq!(ctx.environment_defaults["instanceType"], "m5.large");
        assert_eq!(ctx.service_labels["cost-center"], "42");

        let dev = BuildContext::from_manifest(&manifest, "dev");
        assert!(dev.environment_defaults.is_empty());
    }

    #[test]
    fn absent_framework_is_commercial() {
        let manifest: ServiceManifest =
            serde_json::from_value(json!({"service": "billing", "owner": "team-x"})).unwrap();
        let ctx = BuildContext::from_manifest(&manifest, "prod");
        assert_eq!(ctx.compliance_framework, ComplianceFramework::Commercial);
    }
}
