//! Rendering command output to stdout.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

/// Output encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
}

/// Render `value` in `format`.
pub fn render(value: &impl Serialize, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).context("failed to encode JSON output"),
        OutputFormat::Yaml => serde_yaml::to_string(value).context("failed to encode YAML output"),
    }
}

/// Print `value` in `format` to stdout.
pub fn emit(value: &impl Serialize, format: OutputFormat) -> Result<()> {
    println!("{}", render(value, format)?.trim_end());
    Ok(())
}
