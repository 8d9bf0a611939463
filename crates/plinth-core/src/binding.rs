//! # Bindings: Declared Dependencies Between Components
//!
//! A binding says "this component needs capability C from that component".
//! The target is either a component named directly (`to`) or the single
//! component matched by a label selector (`select`).
//!
//! On the wire both shapes share one object with mutually exclusive `to` and
//! `select` keys. The typed model is a tagged union: [`BindingTarget`] has
//! exactly two constructors, and deserialization goes through [`RawBinding`]
//! so that a binding declaring both (or neither) is rejected when the value
//! is constructed, not when it is used.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::manifest::{ComponentName, ComponentSpec};

/// Access level requested by a binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Read-only access.
    #[default]
    Read,
    /// Write-only access.
    Write,
    /// Read and write access.
    #[serde(rename = "readwrite")]
    ReadWrite,
    /// Administrative access.
    Admin,
}

impl AccessLevel {
    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "readwrite",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "readwrite" => Ok(Self::ReadWrite),
            "admin" => Ok(Self::Admin),
            other => Err(ModelError::UnknownAccessLevel(other.to_string())),
        }
    }
}

/// Selects the component(s) of one type carrying every listed label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Registered component type the target must have.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Labels the target must carry with exactly these values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Returns true if `component` has the selector's type and every label.
    pub fn matches(&self, component: &ComponentSpec) -> bool {
        component.component_type == self.component_type
            && self
                .with_labels
                .iter()
                .all(|(k, v)| component.labels.get(k) == Some(v))
    }
}

impl std::fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "type={}", self.component_type)?;
        for (k, v) in &self.with_labels {
            write!(f, ",{k}={v}")?;
        }
        Ok(())
    }
}

/// The target half of a binding: exactly one of direct name or selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingTarget {
    /// `to: <componentName>`
    Direct(ComponentName),
    /// `select: {type, withLabels}`
    Selector(LabelSelector),
}

impl std::fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(name) => write!(f, "to={name}"),
            Self::Selector(sel) => write!(f, "select({sel})"),
        }
    }
}

/// A declared dependency on a capability exposed by another component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBinding", into = "RawBinding")]
pub struct Binding {
    /// Which component provides the capability.
    pub target: BindingTarget,
    /// Capability string the target must expose (e.g. `db:postgres`).
    pub capability: String,
    /// Requested access level.
    pub access: AccessLevel,
    /// Environment variable names to inject, keyed by logical name.
    pub env: BTreeMap<String, String>,
    /// Opaque binding options passed through to synthesis.
    pub options: Option<Value>,
}

impl Binding {
    /// Construct a direct binding.
    pub fn direct(to: ComponentName, capability: impl Into<String>) -> Self {
        Self {
            target: BindingTarget::Direct(to),
            capability: capability.into(),
            access: AccessLevel::default(),
            env: BTreeMap::new(),
            options: None,
        }
    }

    /// Construct a selector binding.
    pub fn selector(selector: LabelSelector, capability: impl Into<String>) -> Self {
        Self {
            target: BindingTarget::Selector(selector),
            capability: capability.into(),
            access: AccessLevel::default(),
            env: BTreeMap::new(),
            options: None,
        }
    }
}

/// Wire shape of a binding with both target keys optional.
///
/// Only used as the serde bridge; [`Binding`] is the type the rest of the
/// code works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<ComponentName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select: Option<LabelSelector>,
    capability: String,
    #[serde(default)]
    access: AccessLevel,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Value>,
}

impl TryFrom<RawBinding> for Binding {
    type Error = ModelError;

    fn try_from(raw: RawBinding) -> Result<Self, Self::Error> {
        let target = match (raw.to, raw.select) {
            (Some(to), None) => BindingTarget::Direct(to),
            (None, Some(select)) => BindingTarget::Selector(select),
            (Some(_), Some(_)) => return Err(ModelError::AmbiguousBindingTarget),
            (None, None) => return Err(ModelError::MissingBindingTarget),
        };
        Ok(Self {
            target,
            capability: raw.capability,
            access: raw.access,
            env: raw.env,
            options: raw.options,
        })
    }
}

impl From<Binding> for RawBinding {
    fn from(binding: Binding) -> Self {
        let (to, select) = match binding.target {
            BindingTarget::Direct(name) => (Some(name), None),
            BindingTarget::Selector(sel) => (None, Some(sel)),
        };
        Self {
            to,
            select,
            capability: binding.capability,
            access: binding.access,
            env: binding.env,
            options: binding.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(name: &str, ty: &str, labels: &[(&str, &str)]) -> ComponentSpec {
        let mut spec = ComponentSpec::new(ComponentName::new(name).unwrap(), ty);
        for (k, v) in labels {
            spec.labels.insert(k.to_string(), v.to_string());
        }
        spec
    }

    #[test]
    fn direct_binding_deserializes() {
        let b: Binding = serde_json::from_value(json!({
            "to": "db",
            "capability": "db:postgres",
            "access": "readwrite",
            "env": {"host": "DB_HOST"}
        }))
        .unwrap();
        assert_eq!(b.target, BindingTarget::Direct(ComponentName::new("db").unwrap()));
        assert_eq!(b.access, AccessLevel::ReadWrite);
        assert_eq!(b.env["host"], "DB_HOST");
    }

    #[test]
    fn selector_binding_deserializes() {
        let b: Binding = serde_json::from_value(json!({
            "select": {"type": "rds-postgres", "withLabels": {"tier": "data"}},
            "capability": "db:postgres"
        }))
        .unwrap();
        match b.target {
            BindingTarget::Selector(sel) => {
                assert_eq!(sel.component_type, "rds-postgres");
                assert_eq!(sel.with_labels["tier"], "data");
            }
            other => panic!("expected selector, got {other:?}"),
        }
        assert_eq!(b.access, AccessLevel::Read);
    }

    #[test]
    fn both_targets_rejected_at_construction() {
        let result: Result<Binding, _> = serde_json::from_value(json!({
            "to": "db",
            "select": {"type": "rds-postgres"},
            "capability": "db:postgres"
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("both"), "unexpected error: {err}");
    }

    #[test]
    fn missing_target_rejected_at_construction() {
        let result: Result<Binding, _> =
            serde_json::from_value(json!({"capability": "db:postgres"}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("neither"), "unexpected error: {err}");
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let b = Binding::direct(ComponentName::new("db").unwrap(), "db:postgres");
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v, json!({"to": "db", "capability": "db:postgres", "access": "read"}));
    }

    #[test]
    fn selector_requires_type_and_all_labels() {
        let sel = LabelSelector {
            component_type: "rds-postgres".into(),
            with_labels: [("tier".to_string(), "data".to_string())].into(),
        };
        assert!(sel.matches(&component("a", "rds-postgres", &[("tier", "data"), ("x", "y")])));
        assert!(!sel.matches(&component("b", "rds-postgres", &[("tier", "web")])));
        assert!(!sel.matches(&component("c", "rds-postgres", &[])));
        assert!(!sel.matches(&component("d", "s3-bucket", &[("tier", "data")])));
    }

    #[test]
    fn selector_without_labels_matches_type_only() {
        let sel = LabelSelector {
            component_type: "s3-bucket".into(),
            with_labels: BTreeMap::new(),
        };
        assert!(sel.matches(&component("a", "s3-bucket", &[("any", "thing")])));
    }

    #[test]
    fn access_level_parse() {
        assert_eq!("admin".parse::<AccessLevel>().unwrap(), AccessLevel::Admin);
        assert!("owner".parse::<AccessLevel>().is_err());
    }
}
