//! # Compliance Default Table
//!
//! Framework → component type → configuration tree, loaded once from the
//! embedded `defaults/compliance.yaml` and shared read-only afterwards.
//! The same table supplies both layer 2 (the whole tree) and layer 6 (the
//! values at the paths locked for the framework).

use std::collections::BTreeMap;

use plinth_core::ComplianceFramework;
use plinth_schema::CatalogError;
use serde_json::{Map, Value};

const BUILTIN_TABLE: &str = include_str!("../defaults/compliance.yaml");

/// Compliance-framework defaults for every component type.
#[derive(Debug, Clone, Default)]
pub struct ComplianceTable {
    tables: BTreeMap<ComplianceFramework, BTreeMap<String, Value>>,
}

impl ComplianceTable {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_TABLE)
    }

    /// Parse a table from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Inconsistent`] for malformed YAML, unknown
    /// framework names, or per-type entries that are not mappings.
    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let inconsistent = |reason: String| CatalogError::Inconsistent {
            what: "compliance table".to_string(),
            reason,
        };
        let tables: BTreeMap<ComplianceFramework, BTreeMap<String, Value>> =
            serde_yaml::from_str(text).map_err(|e| inconsistent(e.to_string()))?;
        for (framework, types) in &tables {
            for (component_type, tree) in types {
                if !tree.is_object() {
                    return Err(inconsistent(format!(
                        "{framework}/{component_type} must be a mapping"
                    )));
                }
            }
        }
        Ok(Self { tables })
    }

    /// Layer-2 tree for `component_type` under `framework`; empty when the
    /// table has no entry.
    pub fn defaults(&self, framework: ComplianceFramework, component_type: &str) -> Value {
        self.tables
            .get(&framework)
            .and_then(|types| types.get(component_type))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// The value `framework` mandates at `pointer`, if any.
    pub fn mandated_value(
        &self,
        framework: ComplianceFramework,
        component_type: &str,
        pointer: &str,
    ) -> Option<&Value> {
        self.tables
            .get(&framework)?
            .get(component_type)?
            .pointer(pointer)
    }

    /// Component types the table has entries for under `framework`.
    pub fn component_types(&self, framework: ComplianceFramework) -> impl Iterator<Item = &str> {
        self.tables
            .get(&framework)
            .into_iter()
            .flat_map(|types| types.keys().map(String::as_str))
    }
}
