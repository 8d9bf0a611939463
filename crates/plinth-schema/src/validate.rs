//! # Schema Validation
//!
//! Validates manifests and component configuration against the ref-free
//! schemas of a [`SchemaRegistry`] (Draft 2020-12, via the `jsonschema`
//! crate). Validators are compiled once in [`SchemaValidator::new`]; the
//! validator is `Send + Sync` and meant to be shared behind an `Arc`.
//!
//! ## Reporting
//!
//! Validation is fail-slow: every violation in the document is collected
//! into one [`SchemaValidationError`]. Each [`Violation`] carries the
//! instance path, the schema path, the failing keyword, a message naming
//! the expected constraint, and the actual value found.
//!
//! Before reporting, violations are coalesced:
//!
//! - exact duplicates (same path, keyword and message) are dropped;
//! - `type`, `enum`, `const`, `oneOf` and `anyOf` failures at the same
//!   instance path collapse into one "expected one of" violation;
//! - `required` failures are never merged.
//!
//! Output is sorted by instance path, then keyword.
//!
//! ## Deferred Values
//!
//! Inside a component's `config`, members whose value still depends on
//! the target environment (`${env:...}` / `${envIs:...}` strings, or
//! objects keyed only by declared environment names) cannot be checked
//! before hydration as written. They are masked out of the manifest pass.
//! Instead, for every declared environment the config is projected onto
//! that environment (each environment-keyed map replaced by its branch,
//! token-bearing values dropped) and checked against the type's override
//! schema. Violations found there are reported at the branch's own path,
//! so `{"prod": 99999}` under `sizeGb` fails at `.../sizeGb/prod`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use jsonschema::{Retrieve, Uri, Validator};
use plinth_core::value::join_pointer;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::components::ComponentTypeRegistry;
use crate::compose::compose_manifest_schema;
use crate::error::CatalogError;
use crate::registry::{SchemaRegistry, MANIFEST_SCHEMA};

/// Keywords whose failures at one instance path are reported together.
const COALESCED_KEYWORDS: &[&str] = &["type", "enum", "const", "oneOf", "anyOf"];

/// Refuses every retrieval. Expanded schemas contain no `$ref`, so any
/// request reaching this is a registry defect, never a network fetch.
struct NoRemoteRetriever;

impl Retrieve for NoRemoteRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("remote schema retrieval is disabled: {}", uri.as_str()).into())
    }
}

/// Error raised when a document does not satisfy its schema.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The document violated one or more constraints.
    #[error("validation failed against '{schema}' ({} violation(s)):\n{violations}", .violations.len())]
    ValidationFailed {
        /// Schema the document was checked against.
        schema: String,
        /// Every violation found, coalesced and sorted.
        violations: ValidationViolations,
    },

    /// Configuration was checked against a type that is not registered.
    #[error("component type '{0}' is not registered")]
    UnknownComponentType(String),
}

impl SchemaValidationError {
    /// The violations carried by this error, empty for non-validation errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::ValidationFailed { violations, .. } => violations.violations(),
            Self::UnknownComponentType(_) => &[],
        }
    }
}

/// One constraint a document failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// JSON pointer to the offending value (`""` is the document root).
    pub instance_path: String,
    /// JSON pointer to the failing keyword in the schema.
    pub schema_path: String,
    /// The failing keyword (`required`, `maximum`, `pattern`, ...).
    pub keyword: String,
    /// What was expected.
    pub message: String,
    /// The value found at `instance_path`.
    pub actual: Value,
}

impl Violation {
    /// A violation of the document as a whole, for failures detected
    /// outside the schema engine.
    pub fn root(keyword: &str, message: impl Into<String>, actual: Value) -> Self {
        Self {
            instance_path: String::new(),
            schema_path: String::new(),
            keyword: keyword.to_string(),
            message: message.into(),
            actual,
        }
    }

    fn from_error(error: jsonschema::ValidationError<'_>) -> Self {
        let message = error.to_string();
        let instance_path = error.instance_path.to_string();
        let schema_path = error.schema_path.to_string();
        let keyword = schema_path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            instance_path,
            schema_path,
            keyword,
            message,
            actual: error.instance.into_owned(),
        }
    }

    /// The same violation, with `instance_path` moved under `prefix`.
    pub fn under(mut self, prefix: &str) -> Self {
        self.instance_path = format!("{prefix}{}", self.instance_path);
        self
    }

    fn sort_key(&self) -> (&str, &str, &str) {
        (&self.instance_path, &self.keyword, &self.message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Coalesce and sort raw violations.
    pub fn new(raw: Vec<Violation>) -> Self {
        Self {
            violations: coalesce(raw),
        }
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Iterate over violations in report order.
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.violations.iter()
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

fn coalesce(mut raw: Vec<Violation>) -> Vec<Violation> {
    raw.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    raw.dedup_by(|a, b| a.sort_key() == b.sort_key());

    let mut out = Vec::with_capacity(raw.len());
    let mut groups: BTreeMap<String, Vec<Violation>> = BTreeMap::new();
    for violation in raw {
        if COALESCED_KEYWORDS.contains(&violation.keyword.as_str()) {
            groups
                .entry(violation.instance_path.clone())
                .or_default()
                .push(violation);
        } else {
            out.push(violation);
        }
    }

    for (_, group) in groups {
        let mut group = group.into_iter();
        let Some(first) = group.next() else {
            continue;
        };
        let rest: Vec<Violation> = group.collect();
        if rest.is_empty() {
            out.push(first);
            continue;
        }
        let mut messages = vec![first.message];
        messages.extend(rest.into_iter().map(|v| v.message));
        out.push(Violation {
            instance_path: first.instance_path,
            schema_path: first.schema_path,
            keyword: first.keyword,
            message: format!("expected one of: {}", messages.join("; ")),
            actual: first.actual,
        });
    }

    out.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    out
}

/// Returns true if `value` cannot be validated until hydration for one of
/// `environments` has run.
pub fn is_deferred(value: &Value, environments: &BTreeSet<String>) -> bool {
    match value {
        Value::String(s) => s.contains("${env:") || s.contains("${envIs:"),
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| environments.contains(k)),
        Value::Array(items) => items.iter().any(|v| is_deferred(v, environments)),
        _ => false,
    }
}

fn declared_environments(document: &Value) -> BTreeSet<String> {
    document
        .get("environments")
        .and_then(Value::as_object)
        .map(|envs| envs.keys().cloned().collect())
        .unwrap_or_default()
}

/// Copy of `document` with deferred values removed from component configs.
fn mask_deferred_values(document: &Value) -> Value {
    let environments = declared_environments(document);

    let mut masked = document.clone();
    if let Some(Value::Array(components)) = masked.get_mut("components") {
        for component in components {
            let Some(config) = component.get_mut("config") else {
                continue;
            };
            if is_deferred(config, &environments) {
                *config = Value::Object(serde_json::Map::new());
            } else {
                strip_deferred(config, &environments);
            }
        }
    }
    masked
}

fn strip_deferred(node: &mut Value, environments: &BTreeSet<String>) {
    if let Value::Object(map) = node {
        map.retain(|_, v| !is_deferred(v, environments));
        for child in map.values_mut() {
            strip_deferred(child, environments);
        }
    }
}

/// Component config as hydration for `environment` would shape it, minus
/// values that still hold tokens.
///
/// Every environment-keyed map replaced by a branch is recorded in
/// `branches` as (projected pointer, original pointer).
struct Projection<'a> {
    environment: &'a str,
    environments: &'a BTreeSet<String>,
    branches: Vec<(String, String)>,
}

impl Projection<'_> {
    /// `None` when nothing of `value` is left for the environment.
    fn project(&mut self, value: &Value, projected: &str, original: &str) -> Option<Value> {
        match value {
            Value::String(s) if s.contains("${env:") || s.contains("${envIs:") => None,
            Value::Object(map) => {
                if let Some(branch) = map.get(self.environment) {
                    let original = join_pointer(original, self.environment);
                    self.branches.push((projected.to_string(), original.clone()));
                    return self.project(branch, projected, &original);
                }
                if is_deferred(value, self.environments) {
                    return None;
                }
                let mut out = serde_json::Map::new();
                for (key, child) in map {
                    let child_projected = join_pointer(projected, key);
                    let child_original = join_pointer(original, key);
                    if let Some(child) = self.project(child, &child_projected, &child_original) {
                        out.insert(key.clone(), child);
                    }
                }
                Some(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.project(item, &format!("{projected}/{i}"), &format!("{original}/{i}"))
                })
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            other => Some(other.clone()),
        }
    }

    /// Map a pointer into the projection back to the manifest's config.
    fn restore(&self, pointer: &str) -> String {
        let within = |prefix: &str| {
            pointer == prefix
                || pointer
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        };
        match self
            .branches
            .iter()
            .filter(|(projected, _)| within(projected.as_str()))
            .max_by_key(|(projected, _)| projected.len())
        {
            Some((projected, original)) => format!("{original}{}", &pointer[projected.len()..]),
            None => pointer.to_string(),
        }
    }
}

fn compile(name: &str, schema: &Value) -> Result<Validator, CatalogError> {
    jsonschema::options()
        .with_draft(jsonschema::Draft::Draft202012)
        .with_retriever(NoRemoteRetriever)
        .build(schema)
        .map_err(|e| CatalogError::Compile {
            schema: name.to_string(),
            reason: e.to_string(),
        })
}

fn collect(schema: &str, validator: &Validator, instance: &Value) -> Result<(), SchemaValidationError> {
    report(schema, validator.iter_errors(instance).map(Violation::from_error).collect())
}

fn report(schema: &str, raw: Vec<Violation>) -> Result<(), SchemaValidationError> {
    if raw.is_empty() {
        return Ok(());
    }
    let violations = ValidationViolations::new(raw);
    debug!(schema, violations = violations.len(), "schema validation failed");
    Err(SchemaValidationError::ValidationFailed {
        schema: schema.to_string(),
        violations,
    })
}

struct CompiledType {
    full: Validator,
    partial: Validator,
}

/// Compiled validators for the manifest and every component type.
pub struct SchemaValidator {
    manifest_schema: Value,
    manifest: Validator,
    types: ComponentTypeRegistry,
    compiled: BTreeMap<String, CompiledType>,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("component_types", &self.types.names().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaValidator {
    /// Compose and compile every schema in `registry`.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the registry lacks the manifest
    /// schema, a component schema is malformed, or a schema fails to
    /// compile.
    pub fn new(registry: &SchemaRegistry) -> Result<Self, CatalogError> {
        let types = ComponentTypeRegistry::from_registry(registry)?;
        let manifest_schema = compose_manifest_schema(registry.require(MANIFEST_SCHEMA)?, &types)?;
        let manifest = compile(MANIFEST_SCHEMA, &manifest_schema)?;

        let mut compiled = BTreeMap::new();
        for ty in types.iter() {
            compiled.insert(
                ty.name().to_string(),
                CompiledType {
                    full: compile(ty.document(), ty.schema())?,
                    partial: compile(&format!("{} (override)", ty.document()), ty.override_schema())?,
                },
            );
        }
        debug!(component_types = compiled.len(), "compiled schema validators");

        Ok(Self {
            manifest_schema,
            manifest,
            types,
            compiled,
        })
    }

    /// Validator over the built-in registry.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(&SchemaRegistry::builtin()?)
    }

    /// Validator over a registry loaded from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::new(&SchemaRegistry::from_dir(dir)?)
    }

    /// The component types the validator was built for.
    pub fn component_types(&self) -> &ComponentTypeRegistry {
        &self.types
    }

    /// The composed, ref-free manifest schema.
    pub fn manifest_schema(&self) -> &Value {
        &self.manifest_schema
    }

    /// Validate a whole manifest tree, including every environment's
    /// branch of environment-dependent component config.
    pub fn validate_manifest(&self, document: &Value) -> Result<(), SchemaValidationError> {
        let mut raw: Vec<Violation> = self
            .manifest
            .iter_errors(&mask_deferred_values(document))
            .map(Violation::from_error)
            .collect();
        raw.extend(self.environment_branch_violations(document));
        report(MANIFEST_SCHEMA, raw)
    }

    fn environment_branch_violations(&self, document: &Value) -> Vec<Violation> {
        let environments = declared_environments(document);
        let Some(components) = document.get("components").and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for (i, component) in components.iter().enumerate() {
            let Some(config) = component.get("config") else {
                continue;
            };
            // unknown types are reported by the manifest pass
            let Some(compiled) = component
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| self.compiled.get(t))
            else {
                continue;
            };
            let base = format!("/components/{i}/config");
            for environment in &environments {
                let mut projection = Projection {
                    environment: environment.as_str(),
                    environments: &environments,
                    branches: Vec::new(),
                };
                let Some(projected) = projection.project(config, "", "") else {
                    continue;
                };
                if projection.branches.is_empty() {
                    continue;
                }
                out.extend(compiled.partial.iter_errors(&projected).map(|e| {
                    let mut violation = Violation::from_error(e);
                    violation.instance_path = format!("{base}{}", projection.restore(&violation.instance_path));
                    violation
                }));
            }
        }
        out
    }

    /// Validate complete configuration for `component_type`.
    pub fn validate_component_config(
        &self,
        component_type: &str,
        config: &Value,
    ) -> Result<(), SchemaValidationError> {
        let (document, compiled) = self.lookup(component_type)?;
        collect(document, &compiled.full, config)
    }

    /// Validate partial, user-supplied configuration for `component_type`.
    pub fn validate_component_override(
        &self,
        component_type: &str,
        config: &Value,
    ) -> Result<(), SchemaValidationError> {
        let (document, compiled) = self.lookup(component_type)?;
        collect(document, &compiled.partial, config)
    }

    fn lookup(&self, component_type: &str) -> Result<(&str, &CompiledType), SchemaValidationError> {
        let unknown = || SchemaValidationError::UnknownComponentType(component_type.to_string());
        let ty = self.types.get(component_type).ok_or_else(unknown)?;
        let compiled = self.compiled.get(component_type).ok_or_else(unknown)?;
        Ok((ty.document(), compiled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn violation(path: &str, keyword: &str, message: &str) -> Violation {
        Violation {
            instance_path: path.to_string(),
            schema_path: format!("/x/{keyword}"),
            keyword: keyword.to_string(),
            message: message.to_string(),
            actual: Value::Null,
        }
    }

    #[test]
    fn duplicates_dropped() {
        let out = coalesce(vec![
            violation("/a", "maximum", "too big"),
            violation("/a", "maximum", "too big"),
        ]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn type_family_coalesced_per_path() {
        let out = coalesce(vec![
            violation("/a", "type", "not a string"),
            violation("/a", "enum", "not one of [1, 2]"),
            violation("/b", "type", "not a string"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].instance_path, "/a");
        assert!(out[0].message.starts_with("expected one of: "));
        assert!(out[0].message.contains("not a string"));
        assert!(out[0].message.contains("not one of [1, 2]"));
        assert_eq!(out[1].message, "not a string");
    }

    #[test]
    fn required_never_coalesced() {
        let out = coalesce(vec![
            violation("", "required", "\"owner\" is a required property"),
            violation("", "required", "\"service\" is a required property"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn output_sorted_by_path_then_keyword() {
        let out = coalesce(vec![
            violation("/z", "pattern", "p"),
            violation("/a", "required", "r"),
            violation("/a", "maximum", "m"),
        ]);
        let keys: Vec<_> = out.iter().map(|v| (v.instance_path.as_str(), v.keyword.as_str())).collect();
        assert_eq!(keys, vec![("/a", "maximum"), ("/a", "required"), ("/z", "pattern")]);
    }

    #[test]
    fn deferred_detection() {
        let envs: BTreeSet<String> = ["dev".to_string(), "prod".to_string()].into();
        assert!(is_deferred(&json!("${env:SIZE}"), &envs));
        assert!(is_deferred(&json!("x-${env:SUFFIX}"), &envs));
        assert!(is_deferred(&json!("${envIs:prod}"), &envs));
        assert!(is_deferred(&json!({"prod": 1, "dev": 2}), &envs));
        assert!(is_deferred(&json!(["sg-1", "${env:SG}"]), &envs));
        assert!(!is_deferred(&json!({"prod": 1, "size": 2}), &envs));
        assert!(!is_deferred(&json!({}), &envs));
        assert!(!is_deferred(&json!(8), &envs));
    }

    #[test]
    fn masking_only_touches_component_config() {
        let doc = json!({
            "service": "${env:NAME}",
            "environments": {"prod": {"defaults": {}}},
            "components": [{
                "name": "db",
                "type": "ec2-instance",
                "config": {
                    "instanceType": {"prod": "m5.large"},
                    "storage": {"sizeGb": "${env:DISK}", "volumeType": "gp3"}
                }
            }]
        });
        let masked = mask_deferred_values(&doc);
        assert_eq!(masked["service"], "${env:NAME}");
        assert_eq!(
            masked["components"][0]["config"],
            json!({"storage": {"volumeType": "gp3"}})
        );
        // input untouched
        assert_eq!(doc["components"][0]["config"]["storage"]["sizeGb"], "${env:DISK}");
    }

    #[test]
    fn projection_selects_branches_and_records_paths() {
        let envs: BTreeSet<String> = ["dev".to_string(), "prod".to_string()].into();
        let mut projection = Projection {
            environment: "prod",
            environments: &envs,
            branches: Vec::new(),
        };
        let config = json!({
            "storage": {"prod": {"sizeGb": {"prod": 500, "dev": 20}, "volumeType": "gp3"}},
            "keyName": "${env:KEY}",
            "zones": [{"dev": "a"}],
            "ami": "ami-1"
        });
        let projected = projection.project(&config, "", "").unwrap();
        assert_eq!(
            projected,
            json!({"storage": {"sizeGb": 500, "volumeType": "gp3"}, "ami": "ami-1"})
        );
        assert_eq!(projection.restore("/storage/sizeGb"), "/storage/prod/sizeGb/prod");
        assert_eq!(projection.restore("/storage/volumeType"), "/storage/prod/volumeType");
        assert_eq!(projection.restore("/ami"), "/ami");
        assert_eq!(projection.restore("/storageX"), "/storageX");
    }

    #[test]
    fn projection_of_environment_keyed_root() {
        let envs: BTreeSet<String> = ["prod".to_string()].into();
        let mut projection = Projection {
            environment: "prod",
            environments: &envs,
            branches: Vec::new(),
        };
        let projected = projection.project(&json!({"prod": {"ami": "x"}}), "", "").unwrap();
        assert_eq!(projected, json!({"ami": "x"}));
        assert_eq!(projection.restore(""), "/prod");
        assert_eq!(projection.restore("/ami"), "/prod/ami");
    }

    #[test]
    fn violation_under_prefix() {
        let v = violation("/storage", "type", "t").under("/components/2/config");
        assert_eq!(v.instance_path, "/components/2/config/storage");
    }

    #[test]
    fn builtin_validator_accepts_minimal_manifest() {
        let validator = SchemaValidator::builtin().unwrap();
        let doc = json!({
            "service": "billing",
            "owner": "team-x",
            "components": [{"name": "db", "type": "ec2-instance", "config": {}}]
        });
        validator.validate_manifest(&doc).unwrap();
    }

    #[test]
    fn unknown_component_type_lookup_fails() {
        let validator = SchemaValidator::builtin().unwrap();
        let err = validator
            .validate_component_config("mainframe", &json!({}))
            .unwrap_err();
        assert!(matches!(err, SchemaValidationError::UnknownComponentType(ref t) if t == "mainframe"));
        assert!(err.violations().is_empty());
    }

    #[test]
    fn override_accepts_partial_config_full_does_not() {
        let validator = SchemaValidator::builtin().unwrap();
        let partial = json!({"storage": {"encrypted": true}});
        validator
            .validate_component_override("ec2-instance", &partial)
            .unwrap();
        let err = validator
            .validate_component_config("ec2-instance", &partial)
            .unwrap_err();
        assert!(err.violations().iter().any(|v| v.keyword == "required"));
    }

    #[test]
    fn violation_display_marks_root() {
        let v = Violation::root("required", "\"owner\" is a required property", json!({}));
        assert_eq!(v.to_string(), "  (root): \"owner\" is a required property");
    }
}
