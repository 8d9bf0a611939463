//! # Resolved Configuration
//!
//! The builder's output contract to synthesis: a complete configuration
//! tree valid under the component's schema, which layer supplied every
//! leaf, which mandated values overturned a weaker setting, and a digest
//! of the canonical bytes for drift detection.

use std::collections::BTreeMap;

use plinth_core::{ComplianceFramework, ComponentName, ContentDigest};
use serde::Serialize;
use serde_json::Value;

use crate::layers::ConfigLayer;

/// A mandated value that replaced a different lower-layer value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyEnforcement {
    /// Locked JSON pointer.
    pub pointer: String,
    /// Value the lower layers produced.
    pub attempted: Value,
    /// Layer that produced `attempted`.
    pub attempted_by: ConfigLayer,
    /// Value the policy layer re-asserted.
    pub enforced: Value,
}

/// Fully resolved configuration for one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    /// Component name.
    pub component: ComponentName,
    /// Registered type.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Framework the configuration was resolved under.
    pub compliance_framework: ComplianceFramework,
    /// Target environment.
    pub environment: String,
    /// The merged tree.
    pub config: Value,
    /// Leaf pointer to the layer that supplied its value.
    pub provenance: BTreeMap<String, ConfigLayer>,
    /// Policy re-assertions, in pointer order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enforcements: Vec<PolicyEnforcement>,
    /// SHA-256 of the canonical bytes of `config`.
    pub digest: ContentDigest,
}

impl ResolvedConfig {
    /// The value at `pointer` in the merged tree.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.config.pointer(pointer)
    }

    /// The layer that supplied the leaf at `pointer`.
    pub fn source_of(&self, pointer: &str) -> Option<ConfigLayer> {
        self.provenance.get(pointer).copied()
    }
}
