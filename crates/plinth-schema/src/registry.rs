//! # Schema Registry
//!
//! The versioned set of JSON Schema documents the pipeline validates
//! against, keyed by path relative to the registry root
//! (`service-manifest.schema.json`, `components/s3-bucket.schema.json`).
//!
//! ## Ref Expansion
//!
//! Every document is expanded once, at load, into a ref-free tree. After
//! that, validation is a pure tree walk with no URI resolution at all.
//! `$ref` forms that resolve:
//!
//! - local pointers: `#/$defs/dnsName`
//! - relative files: `binding.schema.json`, `../service-manifest.schema.json#/$defs/labels`
//! - canonical URIs: `https://schemas.plinth.dev/v1/<key>[#pointer]`
//!
//! Anything else (other hosts, `urn:`, anchors) is a [`CatalogError`].
//! Keywords beside a `$ref` are kept, with the referenced schema appended
//! to their `allOf`. `$defs`, `definitions`, `$id` and `$schema` do not
//! appear in expanded output.
//!
//! The registry is read-only after construction; share it by reference.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::CatalogError;

/// Canonical `$id` prefix of every registry document.
pub const SCHEMA_URI_PREFIX: &str = "https://schemas.plinth.dev/v1/";

/// Registry key of the service manifest schema.
pub const MANIFEST_SCHEMA: &str = "service-manifest.schema.json";

/// Documents compiled into the binary.
const BUILTIN_DOCUMENTS: &[(&str, &str)] = &[
    (
        "service-manifest.schema.json",
        include_str!("../schemas/service-manifest.schema.json"),
    ),
    (
        "component.schema.json",
        include_str!("../schemas/component.schema.json"),
    ),
    (
        "binding.schema.json",
        include_str!("../schemas/binding.schema.json"),
    ),
    (
        "components/ec2-instance.schema.json",
        include_str!("../schemas/components/ec2-instance.schema.json"),
    ),
    (
        "components/s3-bucket.schema.json",
        include_str!("../schemas/components/s3-bucket.schema.json"),
    ),
    (
        "components/rds-postgres.schema.json",
        include_str!("../schemas/components/rds-postgres.schema.json"),
    ),
    (
        "components/lambda-api.schema.json",
        include_str!("../schemas/components/lambda-api.schema.json"),
    ),
];

/// Keywords never copied into expanded output.
const DROPPED_KEYWORDS: &[&str] = &["$defs", "definitions", "$id", "$schema"];

/// Keywords whose value is an object of named subschemas.
const SCHEMA_MAP_KEYWORDS: &[&str] = &["properties", "patternProperties", "dependentSchemas"];

/// Keywords whose value is an array of subschemas.
const SCHEMA_ARRAY_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf", "prefixItems"];

/// Keywords whose value is a single subschema.
const SCHEMA_KEYWORDS: &[&str] = &[
    "items",
    "additionalItems",
    "additionalProperties",
    "propertyNames",
    "contains",
    "not",
    "if",
    "then",
    "else",
    "unevaluatedItems",
    "unevaluatedProperties",
];

/// Apply `f` to every subschema directly held by `keyword`.
///
/// Values of non-schema keywords (`enum`, `const`, `default`, `x-*`, ...)
/// are cloned untouched, so literal data is never mistaken for a schema.
pub(crate) fn map_keyword<E>(
    keyword: &str,
    value: &Value,
    f: &mut impl FnMut(&Value) -> Result<Value, E>,
) -> Result<Value, E> {
    match value {
        Value::Object(members) if SCHEMA_MAP_KEYWORDS.contains(&keyword) => {
            let mut out = Map::new();
            for (name, sub) in members {
                out.insert(name.clone(), f(sub)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) if SCHEMA_ARRAY_KEYWORDS.contains(&keyword) => {
            let items: Result<Vec<Value>, E> = items.iter().map(|sub| f(sub)).collect();
            Ok(Value::Array(items?))
        }
        _ if SCHEMA_KEYWORDS.contains(&keyword) => f(value),
        _ => Ok(value.clone()),
    }
}

/// A loaded, fully expanded set of schema documents.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    /// Documents as loaded, keyed by registry key.
    documents: BTreeMap<String, Value>,
    /// Ref-free form of every document.
    expanded: BTreeMap<String, Value>,
}

impl SchemaRegistry {
    /// The registry compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut documents = Vec::with_capacity(BUILTIN_DOCUMENTS.len());
        for (name, text) in BUILTIN_DOCUMENTS {
            documents.push((name.to_string(), parse_document(name, text)?));
        }
        Self::from_documents(documents)
    }

    /// Load every `*.schema.json` under `dir`, recursively.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = dir.as_ref();
        let mut documents = Vec::new();
        collect_dir(root, root, &mut documents)?;
        debug!(dir = %root.display(), documents = documents.len(), "read schema directory");
        Self::from_documents(documents)
    }

    /// Build a registry from `(key, document)` pairs and expand every `$ref`.
    ///
    /// Keys may be given as canonical URIs; the prefix is stripped.
    pub fn from_documents(
        documents: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, CatalogError> {
        let documents: BTreeMap<String, Value> = documents
            .into_iter()
            .map(|(key, doc)| {
                let key = key
                    .strip_prefix(SCHEMA_URI_PREFIX)
                    .map(str::to_string)
                    .unwrap_or(key);
                (key, doc)
            })
            .collect();

        let mut expanded = BTreeMap::new();
        for name in documents.keys() {
            let mut expander = Expander {
                documents: &documents,
                stack: Vec::new(),
            };
            expanded.insert(name.clone(), expander.expand_document(name)?);
        }
        debug!(documents = expanded.len(), "expanded schema registry");
        Ok(Self {
            documents,
            expanded,
        })
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if the registry holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Registry keys in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// The ref-free form of a document.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.expanded.get(name)
    }

    /// The document exactly as loaded.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.documents.get(name)
    }

    /// The ref-free form of a document that must exist.
    pub fn require(&self, name: &str) -> Result<&Value, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::MissingDocument(name.to_string()))
    }
}

fn parse_document(name: &str, text: &str) -> Result<Value, CatalogError> {
    serde_json::from_str(text).map_err(|e| CatalogError::InvalidJson {
        document: name.to_string(),
        reason: e.to_string(),
    })
}

fn collect_dir(
    root: &Path,
    dir: &Path,
    out: &mut Vec<(String, Value)>,
) -> Result<(), CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_dir(root, &path, out)?;
            continue;
        }
        let is_schema = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".schema.json"));
        if !is_schema {
            continue;
        }
        let key = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        out.push((key.clone(), parse_document(&key, &text)?));
    }
    Ok(())
}

/// Depth-first `$ref` inliner. `stack` holds `document#pointer` keys of
/// the targets currently being expanded.
struct Expander<'a> {
    documents: &'a BTreeMap<String, Value>,
    stack: Vec<String>,
}

impl<'a> Expander<'a> {
    fn expand_document(&mut self, name: &str) -> Result<Value, CatalogError> {
        let documents = self.documents;
        let root = documents
            .get(name)
            .ok_or_else(|| CatalogError::MissingDocument(name.to_string()))?;
        self.enter(format!("{name}#"))?;
        let out = self.expand_schema(name, root)?;
        self.stack.pop();
        Ok(out)
    }

    fn expand_schema(&mut self, document: &str, node: &Value) -> Result<Value, CatalogError> {
        let Value::Object(map) = node else {
            return Ok(node.clone());
        };

        let mut out = Map::new();
        for (keyword, value) in map {
            if keyword == "$ref" || DROPPED_KEYWORDS.contains(&keyword.as_str()) {
                continue;
            }
            let expanded =
                map_keyword(keyword, value, &mut |sub| self.expand_schema(document, sub))?;
            out.insert(keyword.clone(), expanded);
        }

        let Some(reference) = map.get("$ref") else {
            return Ok(Value::Object(out));
        };
        let reference = reference
            .as_str()
            .ok_or_else(|| CatalogError::UnsupportedRef {
                document: document.to_string(),
                reference: reference.to_string(),
            })?;
        let target = self.expand_ref(document, reference)?;
        if out.is_empty() {
            return Ok(target);
        }
        match out.get_mut("allOf") {
            Some(Value::Array(items)) => items.push(target),
            _ => {
                out.insert("allOf".to_string(), Value::Array(vec![target]));
            }
        }
        Ok(Value::Object(out))
    }

    fn expand_ref(&mut self, document: &str, reference: &str) -> Result<Value, CatalogError> {
        let (target_doc, pointer) = resolve_reference(document, reference)?;
        let documents = self.documents;
        let root = documents
            .get(&target_doc)
            .ok_or_else(|| CatalogError::MissingDocument(target_doc.clone()))?;
        let node = root
            .pointer(&pointer)
            .ok_or_else(|| CatalogError::UnresolvedPointer {
                document: target_doc.clone(),
                pointer: pointer.clone(),
            })?;
        self.enter(format!("{target_doc}#{pointer}"))?;
        let out = self.expand_schema(&target_doc, node)?;
        self.stack.pop();
        Ok(out)
    }

    fn enter(&mut self, key: String) -> Result<(), CatalogError> {
        if self.stack.contains(&key) {
            let mut chain = self.stack.clone();
            chain.push(key);
            return Err(CatalogError::RefCycle { chain });
        }
        self.stack.push(key);
        Ok(())
    }
}

/// Split a `$ref` into `(registry key, JSON pointer)` relative to the
/// document it appears in.
fn resolve_reference(document: &str, reference: &str) -> Result<(String, String), CatalogError> {
    let unsupported = || CatalogError::UnsupportedRef {
        document: document.to_string(),
        reference: reference.to_string(),
    };
    let (location, fragment) = reference.split_once('#').unwrap_or((reference, ""));
    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(unsupported());
    }

    let target = if location.is_empty() {
        document.to_string()
    } else if let Some(key) = location.strip_prefix(SCHEMA_URI_PREFIX) {
        key.to_string()
    } else if location.contains(':') {
        return Err(unsupported());
    } else {
        join_relative(document, location).ok_or_else(unsupported)?
    };
    Ok((target, fragment.to_string()))
}

/// Resolve `relative` against the directory of registry key `base`.
/// Returns `None` for absolute paths or paths escaping the registry root.
fn join_relative(base: &str, relative: &str) -> Option<String> {
    if relative.starts_with('/') {
        return None;
    }
    let mut segments: Vec<&str> = base.split('/').collect();
    segments.pop();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}
