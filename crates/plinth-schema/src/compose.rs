//! # Master Manifest Schema Composition
//!
//! The registry's manifest schema describes `config` as an arbitrary
//! object. At load time it is specialised against the component-type
//! registry:
//!
//! - `components.items.properties.type` gets an `enum` of registered types;
//! - `components.items.allOf` gets one `if/then` branch per type that
//!   constrains `config` to that type's override schema.
//!
//! A manifest is then validated in one pass, and every violation in any
//! component's config is reported alongside top-level ones.

use serde_json::{json, Map, Value};

use crate::components::ComponentTypeRegistry;
use crate::error::CatalogError;
use crate::registry::MANIFEST_SCHEMA;

/// Specialise the ref-free manifest schema for `types`.
pub fn compose_manifest_schema(
    manifest: &Value,
    types: &ComponentTypeRegistry,
) -> Result<Value, CatalogError> {
    let inconsistent = |reason: &str| CatalogError::Inconsistent {
        what: MANIFEST_SCHEMA.to_string(),
        reason: reason.to_string(),
    };

    let mut composed = manifest.clone();
    let item = composed
        .pointer_mut("/properties/components/items")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| inconsistent("no object schema at /properties/components/items"))?;

    let type_schema = item
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| inconsistent("component properties must be an object"))?
        .entry("type")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(type_schema) = type_schema else {
        return Err(inconsistent("component type schema must be an object"));
    };
    type_schema.insert(
        "enum".to_string(),
        Value::Array(types.names().map(|n| Value::String(n.to_string())).collect()),
    );

    let branches = types.iter().map(|ty| {
        json!({
            "if": {
                "properties": {"type": {"const": ty.name()}},
                "required": ["type"]
            },
            "then": {
                "properties": {"config": ty.override_schema()}
            }
        })
    });
    match item.get_mut("allOf") {
        Some(Value::Array(existing)) => existing.extend(branches),
        _ => {
            item.insert("allOf".to_string(), Value::Array(branches.collect()));
        }
    }
    Ok(composed)
}
