//! # Service Manifest Model
//!
//! The typed form of a service manifest after structural decoding and
//! schema validation. Free-form trees (`config`, `overrides`, `policy`,
//! `governance`, `extensions`) stay as `serde_json::Value`; everything the
//! pipeline reasons about (names, types, labels, bindings, framework) is
//! typed.
//!
//! ## Lifecycle
//!
//! A manifest is decoded once per run, hydrated into a new value for one
//! target environment, and discarded when the run completes. Hydration
//! never mutates the pre-hydration manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::binding::Binding;
use crate::error::ModelError;
use crate::framework::ComplianceFramework;

/// Unique name of a component within a manifest.
///
/// Constructed only through [`ComponentName::new`], which enforces
/// `^[a-z0-9-]+$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ComponentName(String);

impl ComponentName {
    /// Validate and wrap a component name.
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if valid {
            Ok(Self(name))
        } else {
            Err(ModelError::InvalidComponentName(name))
        }
    }

    /// Access the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ComponentName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ComponentName> for String {
    fn from(name: ComponentName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-environment settings declared in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    /// Values used for `${env:KEY}` substitution and the environment-default
    /// configuration layer.
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

/// One declared infrastructure unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Unique component name.
    pub name: ComponentName,
    /// Registered component type (e.g. `rds-postgres`).
    #[serde(rename = "type")]
    pub component_type: String,
    /// Author-supplied configuration; the component-override layer.
    #[serde(default = "empty_object")]
    pub config: Value,
    /// Dependencies on other components' capabilities.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<Binding>,
    /// Labels used by selector bindings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Synthesis-level overrides, passed through untouched by the builder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Value>,
    /// Component-scoped policy, passed through to synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}

impl ComponentSpec {
    /// A component with empty config, no bindings, and no labels.
    pub fn new(name: ComponentName, component_type: impl Into<String>) -> Self {
        Self {
            name,
            component_type: component_type.into(),
            config: empty_object(),
            binds: Vec::new(),
            labels: BTreeMap::new(),
            overrides: None,
            policy: None,
        }
    }
}

/// The declarative service definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceManifest {
    /// Service name.
    pub service: String,
    /// Owning team.
    pub owner: String,
    /// Regulatory tier. `None` until hydration applies the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_framework: Option<ComplianceFramework>,
    /// Service-wide labels, propagated into platform tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Per-environment defaults keyed by environment name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environments: BTreeMap<String, EnvironmentSpec>,
    /// Components in declaration order.
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    /// Service governance block, passed through to synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance: Option<Value>,
    /// Extension data, passed through to synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl ServiceManifest {
    /// The declared framework, or `commercial` when absent.
    pub fn effective_compliance_framework(&self) -> ComplianceFramework {
        self.compliance_framework.unwrap_or_default()
    }

    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name.as_str() == name)
    }

    /// Defaults declared for `environment`, if any.
    pub fn environment_defaults(&self, environment: &str) -> Option<&Map<String, Value>> {
        self.environments.get(environment).map(|e| &e.defaults)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
