//! # Manifest Parser
//!
//! Structural decoding only: YAML or JSON text in, a generic JSON tree
//! out. No semantic checks happen here; the tree goes to schema
//! validation next and is only decoded into the typed model after it
//! passes.
//!
//! ## Format Detection
//!
//! A path's extension decides (`.json`, `.yaml`, `.yml`); otherwise the
//! text is sniffed: a first non-whitespace `{` means JSON, anything else
//! is parsed as YAML.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Manifest text formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    /// JSON.
    Json,
    /// YAML 1.2.
    Yaml,
}

impl std::fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        })
    }
}

/// Where a manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// A file on disk.
    Path(PathBuf),
    /// In-memory text.
    Text(String),
}

impl ManifestSource {
    /// A manifest file.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Manifest text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Malformed manifest input.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The manifest file could not be read.
    #[error("cannot read manifest {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The text is not well-formed.
    #[error("invalid {format}{}: {message}", location_suffix(.location))]
    Syntax {
        /// Format the text was parsed as.
        format: ManifestFormat,
        /// Parser message.
        message: String,
        /// 1-based `(line, column)` when the parser reports one.
        location: Option<(usize, usize)>,
    },

    /// The document root is not a mapping.
    #[error("manifest root must be a mapping, found {found}")]
    NotAMapping {
        /// JSON type of the root.
        found: &'static str,
    },

    /// A YAML mapping key is not a scalar.
    #[error("unsupported mapping key {key}: keys must be strings, numbers, or booleans")]
    UnsupportedKey {
        /// Debug rendering of the key.
        key: String,
    },

    /// A YAML number has no JSON representation (NaN, infinity).
    #[error("number {0} cannot be represented in JSON")]
    UnrepresentableNumber(String),
}

fn location_suffix(location: &Option<(usize, usize)>) -> String {
    match location {
        Some((line, column)) => format!(" at line {line}, column {column}"),
        None => String::new(),
    }
}

/// A structurally decoded manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// Format the text was parsed as.
    pub format: ManifestFormat,
    /// The manifest tree; always an object.
    pub tree: Value,
}

/// Read and decode a manifest.
pub fn parse(source: &ManifestSource) -> Result<ParsedDocument, ParseError> {
    match source {
        ManifestSource::Path(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
                path: path.clone(),
                source,
            })?;
            let format = format_for_path(path).unwrap_or_else(|| sniff_format(&text));
            debug!(path = %path.display(), %format, "parsing manifest file");
            parse_text(&text, format)
        }
        ManifestSource::Text(text) => parse_text(text, sniff_format(text)),
    }
}

/// Decode manifest text in a known format.
pub fn parse_text(text: &str, format: ManifestFormat) -> Result<ParsedDocument, ParseError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let tree = match format {
        ManifestFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| ParseError::Syntax {
            format,
            location: (e.line() > 0).then(|| (e.line(), e.column())),
            message: e.to_string(),
        })?,
        ManifestFormat::Yaml => {
            let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| ParseError::Syntax {
                format,
                location: e.location().map(|l| (l.line(), l.column())),
                message: e.to_string(),
            })?;
            yaml_to_json_value(&yaml)?
        }
    };
    if !tree.is_object() {
        return Err(ParseError::NotAMapping {
            found: json_type_name(&tree),
        });
    }
    Ok(ParsedDocument { format, tree })
}

fn format_for_path(path: &Path) -> Option<ManifestFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(ManifestFormat::Json),
        Some("yaml" | "yml") => Some(ManifestFormat::Yaml),
        _ => None,
    }
}

fn sniff_format(text: &str) -> ManifestFormat {
    match text.trim_start_matches('\u{feff}').trim_start().chars().next() {
        Some('{') => ManifestFormat::Json,
        _ => ManifestFormat::Yaml,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Scalar keys are stringified; tags are ignored.
fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, ParseError> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(u.into()))
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| ParseError::UnrepresentableNumber(n.to_string()))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(ParseError::UnsupportedKey {
                            key: format!("{other:?}"),
                        })
                    }
                };
                json_map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(json_map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_manifest_parses() {
        let doc = parse_text(
            "service: billing\nowner: team-x\ncomponents:\n  - name: db\n    type: rds-postgres\n",
            ManifestFormat::Yaml,
        )
        .unwrap();
        assert_eq!(doc.tree["components"][0]["type"], "rds-postgres");
    }

    #[test]
    fn text_sniffing_picks_json_for_braces() {
        let doc = parse(&ManifestSource::text("  {\"service\": \"billing\"}")).unwrap();
        assert_eq!(doc.format, ManifestFormat::Json);
        let doc = parse(&ManifestSource::text("service: billing")).unwrap();
        assert_eq!(doc.format, ManifestFormat::Yaml);
    }

    #[test]
    fn json_syntax_error_has_location() {
        let err = parse_text("{\n  \"service\": \"billing\",\n  \"owner\": }", ManifestFormat::Json).unwrap_err();
        match &err {
            ParseError::Syntax { format, location, .. } => {
                assert_eq!(*format, ManifestFormat::Json);
                assert_eq!(location.map(|l| l.0), Some(3));
            }
            other => panic!("expected Syntax, got {other}"),
        }
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn yaml_syntax_error_has_location() {
        let err = parse_text("service: billing\nowner: [team-x\n", ManifestFormat::Yaml).unwrap_err();
        assert!(
            matches!(err, ParseError::Syntax { location: Some(_), .. }),
            "unexpected: {err}"
        );
    }

    #[test]
    fn non_mapping_root_rejected() {
        let err = parse_text("- a\n- b\n", ManifestFormat::Yaml).unwrap_err();
        assert!(matches!(err, ParseError::NotAMapping { found: "a sequence" }));
        let err = parse_text("", ManifestFormat::Yaml).unwrap_err();
        assert!(matches!(err, ParseError::NotAMapping { found: "null" }));
    }

    #[test]
    fn complex_yaml_keys_rejected() {
        let err = parse_text("? [a, b]\n: value\n", ManifestFormat::Yaml).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedKey { .. }));
    }

    #[test]
    fn scalar_yaml_keys_stringified() {
        let doc = parse_text("1: one\ntrue: yes\n", ManifestFormat::Yaml).unwrap();
        assert_eq!(doc.tree, json!({"1": "one", "true": "yes"}));
    }

    #[test]
    fn tags_are_ignored() {
        let doc = parse_text("size: !Gb 20\n", ManifestFormat::Yaml).unwrap();
        assert_eq!(doc.tree, json!({"size": 20}));
    }

    #[test]
    fn byte_order_mark_tolerated() {
        let doc = parse(&ManifestSource::text("\u{feff}{\"service\": \"billing\"}")).unwrap();
        assert_eq!(doc.tree["service"], "billing");
    }

    #[test]
    fn file_extension_decides_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.yml");
        std::fs::write(&path, "{service: billing}\n").unwrap();
        // flow-style YAML starting with a brace is still read as YAML
        let doc = parse(&ManifestSource::path(&path)).unwrap();
        assert_eq!(doc.format, ManifestFormat::Yaml);
        assert_eq!(doc.tree["service"], "billing");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = parse(&ManifestSource::path("/nonexistent/plinth.yaml")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
