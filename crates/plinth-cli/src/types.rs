//! # Types Subcommand
//!
//! Lists the registered component types with their capabilities and the
//! configuration paths each compliance framework locks.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use plinth_core::ComplianceFramework;
use plinth_schema::ComponentTypeRegistry;
use serde::Serialize;

use crate::output::{emit, OutputFormat};

/// One row of `plinth types`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSummary {
    /// Component type name.
    #[serde(rename = "type")]
    pub component_type: String,
    /// Schema document the type is defined in.
    pub schema: String,
    /// Exposed capabilities.
    pub capabilities: Vec<String>,
    /// Locked config paths, per framework that locks any.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub locked: BTreeMap<ComplianceFramework, Vec<String>>,
}

/// Summarize every type in `registry`.
pub fn summarize(registry: &ComponentTypeRegistry) -> Vec<TypeSummary> {
    registry
        .iter()
        .map(|ty| TypeSummary {
            component_type: ty.name().to_string(),
            schema: ty.document().to_string(),
            capabilities: ty.capabilities().iter().cloned().collect(),
            locked: ComplianceFramework::all()
                .iter()
                .map(|&fw| (fw, ty.locked_pointers(fw).into_iter().map(String::from).collect::<Vec<_>>()))
                .filter(|(_, pointers)| !pointers.is_empty())
                .collect(),
        })
        .collect()
}

/// Execute the types subcommand.
pub fn run_types(schema_dir: Option<&Path>, format: OutputFormat) -> Result<u8> {
    let orchestrator = crate::load_orchestrator(schema_dir)?;
    emit(&summarize(orchestrator.validator().component_types()), format)?;
    Ok(0)
}
