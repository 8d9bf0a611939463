//! # Component-Type Registry
//!
//! Every registered component type is described by one schema document
//! carrying three annotations next to the ordinary JSON Schema keywords:
//!
//! | Annotation | Where | Meaning |
//! |---|---|---|
//! | `x-component-type` | root | registered type name |
//! | `x-capabilities` | root | capability strings the type exposes |
//! | `x-locked-by` | any property | frameworks under which the property is policy-locked |
//!
//! A lock makes the boundary between "policy-locked" and "ordinarily
//! overridable" fields a declarative property of the schema. The
//! ConfigBuilder reads the locks for the active framework and re-asserts
//! the mandated value at each locked pointer after every other layer.
//!
//! ## Override Schema
//!
//! Component authors supply partial configuration, so user-supplied layers
//! are checked against the *override schema*: the full schema with every
//! `required` and `default` keyword removed. Type, range, pattern and
//! `additionalProperties` constraints still apply.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

use plinth_core::value::join_pointer;
use plinth_core::ComplianceFramework;
use serde_json::{Map, Value};

use crate::error::CatalogError;
use crate::registry::{map_keyword, SchemaRegistry};

/// Root annotation naming the component type.
pub const COMPONENT_TYPE_KEYWORD: &str = "x-component-type";
/// Root annotation listing exposed capabilities.
pub const CAPABILITIES_KEYWORD: &str = "x-capabilities";
/// Property annotation listing the frameworks that lock it.
pub const LOCKED_BY_KEYWORD: &str = "x-locked-by";

/// A configuration path whose value is mandated under some frameworks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyLock {
    /// JSON pointer into the component configuration.
    pub pointer: String,
    /// Frameworks under which the pointer is locked.
    pub frameworks: BTreeSet<ComplianceFramework>,
}

impl PolicyLock {
    /// Returns true if the lock is active under `framework`.
    pub fn applies_to(&self, framework: ComplianceFramework) -> bool {
        self.frameworks.contains(&framework)
    }
}

/// One registered component type.
#[derive(Debug, Clone)]
pub struct ComponentType {
    name: String,
    document: String,
    capabilities: BTreeSet<String>,
    schema: Value,
    override_schema: Value,
    locks: Vec<PolicyLock>,
}

impl ComponentType {
    /// Read a component type from a ref-free schema.
    ///
    /// Returns `Ok(None)` for documents without `x-component-type`.
    pub fn from_schema(document: &str, schema: &Value) -> Result<Option<Self>, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidComponentSchema {
            document: document.to_string(),
            reason,
        };

        let Some(name) = schema.get(COMPONENT_TYPE_KEYWORD) else {
            return Ok(None);
        };
        let name = name
            .as_str()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| invalid(format!("{COMPONENT_TYPE_KEYWORD} must be a non-empty string")))?
            .to_string();

        let capabilities = match schema.get(CAPABILITIES_KEYWORD) {
            None => BTreeSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|c| {
                    c.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(format!("{CAPABILITIES_KEYWORD} entries must be strings")))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(invalid(format!("{CAPABILITIES_KEYWORD} must be an array"))),
        };

        let mut locks = BTreeMap::new();
        collect_locks(document, schema, "", &mut locks)?;
        let locks = locks
            .into_iter()
            .map(|(pointer, frameworks)| PolicyLock {
                pointer,
                frameworks,
            })
            .collect();

        Ok(Some(Self {
            name,
            document: document.to_string(),
            capabilities,
            override_schema: override_schema(schema),
            schema: schema.clone(),
            locks,
        }))
    }

    /// Registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry key of the defining schema.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Capabilities the type exposes.
    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    /// Returns true if the type exposes `capability`.
    pub fn provides(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    /// The full, ref-free configuration schema.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// The schema user-supplied partial configuration is checked against.
    pub fn override_schema(&self) -> &Value {
        &self.override_schema
    }

    /// Every lock declared in the schema, sorted by pointer.
    pub fn locks(&self) -> &[PolicyLock] {
        &self.locks
    }

    /// Pointers locked under `framework`.
    pub fn locked_pointers(&self, framework: ComplianceFramework) -> Vec<&str> {
        self.locks
            .iter()
            .filter(|l| l.applies_to(framework))
            .map(|l| l.pointer.as_str())
            .collect()
    }

    /// Names of the schema's top-level `properties`.
    pub fn top_level_properties(&self) -> Vec<&str> {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|p| p.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn collect_locks(
    document: &str,
    node: &Value,
    pointer: &str,
    out: &mut BTreeMap<String, BTreeSet<ComplianceFramework>>,
) -> Result<(), CatalogError> {
    let Value::Object(map) = node else {
        return Ok(());
    };

    if let Some(raw) = map.get(LOCKED_BY_KEYWORD) {
        let invalid = |reason: String| CatalogError::InvalidComponentSchema {
            document: document.to_string(),
            reason: format!("{LOCKED_BY_KEYWORD} at '{pointer}': {reason}"),
        };
        if pointer.is_empty() {
            return Err(invalid("the configuration root cannot be locked".to_string()));
        }
        let items = raw
            .as_array()
            .ok_or_else(|| invalid("must be an array of framework names".to_string()))?;
        let entry = out.entry(pointer.to_string()).or_default();
        for item in items {
            let framework = item
                .as_str()
                .ok_or_else(|| invalid("framework names must be strings".to_string()))?
                .parse::<ComplianceFramework>()
                .map_err(|e| invalid(e.to_string()))?;
            entry.insert(framework);
        }
    }

    if let Some(Value::Object(properties)) = map.get("properties") {
        for (key, sub) in properties {
            collect_locks(document, sub, &join_pointer(pointer, key), out)?;
        }
    }
    if let Some(Value::Array(items)) = map.get("allOf") {
        for sub in items {
            collect_locks(document, sub, pointer, out)?;
        }
    }
    Ok(())
}

/// Derive the override schema: `schema` without any `required` or
/// `default` keyword, at every depth.
pub fn override_schema(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };
    let mut out = Map::new();
    for (keyword, value) in map {
        if keyword == "required" || keyword == "default" {
            continue;
        }
        let stripped = match map_keyword(keyword, value, &mut |sub| {
            Ok::<_, Infallible>(override_schema(sub))
        }) {
            Ok(v) => v,
            Err(never) => match never {},
        };
        out.insert(keyword.clone(), stripped);
    }
    Value::Object(out)
}

/// All component types found in a schema registry, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ComponentTypeRegistry {
    types: BTreeMap<String, ComponentType>,
}

impl ComponentTypeRegistry {
    /// Collect every document carrying `x-component-type`.
    pub fn from_registry(registry: &SchemaRegistry) -> Result<Self, CatalogError> {
        let mut types = BTreeMap::new();
        for name in registry.names() {
            let schema = registry.require(name)?;
            let Some(ty) = ComponentType::from_schema(name, schema)? else {
                continue;
            };
            if types.contains_key(ty.name()) {
                return Err(CatalogError::DuplicateComponentType(ty.name().to_string()));
            }
            types.insert(ty.name().to_string(), ty);
        }
        Ok(Self { types })
    }

    /// Look up a type by name.
    pub fn get(&self, name: &str) -> Option<&ComponentType> {
        self.types.get(name)
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Registered types in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentType> {
        self.types.values()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builtin() -> ComponentTypeRegistry {
        ComponentTypeRegistry::from_registry(&SchemaRegistry::builtin().unwrap()).unwrap()
    }

    #[test]
    fn builtin_types_and_capabilities() {
        let types = builtin();
        assert_eq!(
            types.names().collect::<Vec<_>>(),
            vec!["ec2-instance", "lambda-api", "rds-postgres", "s3-bucket"]
        );
        assert!(types.get("rds-postgres").unwrap().provides("db:postgres"));
        assert!(types.get("s3-bucket").unwrap().provides("storage:object"));
        assert!(!types.get("lambda-api").unwrap().provides("db:postgres"));
    }

    #[test]
    fn ec2_locks_follow_annotations() {
        let types = builtin();
        let ec2 = types.get("ec2-instance").unwrap();
        assert_eq!(
            ec2.locked_pointers(ComplianceFramework::FedrampModerate),
            vec!["/security/requireImdsv2", "/storage/encrypted"]
        );
        assert_eq!(
            ec2.locked_pointers(ComplianceFramework::FedrampHigh),
            vec![
                "/monitoring/detailed",
                "/security/associatePublicIp",
                "/security/requireImdsv2",
                "/storage/encrypted"
            ]
        );
        assert!(ec2.locked_pointers(ComplianceFramework::Commercial).is_empty());
    }

    #[test]
    fn override_schema_drops_required_and_default_only() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {
                "a": {"type": "integer", "default": 1, "minimum": 0},
                "required": {"type": "boolean"}
            },
            "enum": [{"required": true}]
        });
        assert_eq!(
            override_schema(&schema),
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer", "minimum": 0},
                    "required": {"type": "boolean"}
                },
                "enum": [{"required": true}]
            })
        );
    }

    #[test]
    fn locks_inside_all_of_are_collected() {
        let schema = json!({
            "x-component-type": "t",
            "properties": {
                "a": {"allOf": [{"properties": {"b": {"x-locked-by": ["fedramp-high"]}}}]}
            }
        });
        let ty = ComponentType::from_schema("t.schema.json", &schema).unwrap().unwrap();
        assert_eq!(ty.locked_pointers(ComplianceFramework::FedrampHigh), vec!["/a/b"]);
    }

    #[test]
    fn malformed_annotations_rejected() {
        let unknown = json!({
            "x-component-type": "t",
            "properties": {"a": {"x-locked-by": ["fedramp-extreme"]}}
        });
        assert!(matches!(
            ComponentType::from_schema("t", &unknown),
            Err(CatalogError::InvalidComponentSchema { .. })
        ));

        let root_lock = json!({"x-component-type": "t", "x-locked-by": ["fedramp-high"]});
        assert!(ComponentType::from_schema("t", &root_lock).is_err());

        let caps = json!({"x-component-type": "t", "x-capabilities": "db:sql"});
        assert!(ComponentType::from_schema("t", &caps).is_err());
    }

    #[test]
    fn documents_without_type_annotation_are_skipped() {
        assert!(ComponentType::from_schema("x", &json!({"type": "object"}))
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_type_rejected() {
        let reg = SchemaRegistry::from_documents(vec![
            ("a.schema.json".to_string(), json!({"x-component-type": "t"})),
            ("b.schema.json".to_string(), json!({"x-component-type": "t"})),
        ])
        .unwrap();
        assert!(matches!(
            ComponentTypeRegistry::from_registry(&reg),
            Err(CatalogError::DuplicateComponentType(ref t)) if t == "t"
        ));
    }

    #[test]
    fn top_level_properties_listed() {
        let types = builtin();
        let props = types.get("rds-postgres").unwrap().top_level_properties();
        assert!(props.contains(&"multiAz"));
        assert!(props.contains(&"tags"));
    }
}
