//! # plinth-cli: Command-Line Front End
//!
//! ```bash
//! plinth validate service.yaml
//! plinth plan service.yaml --env prod
//! plinth resolve service.yaml --env prod --format yaml
//! plinth types
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: success (warnings do not change this).
//! - `1`: the manifest is invalid; the failing stage's error is printed.
//! - `2`: internal or I/O error (unreadable file, broken schema
//!   registry, builder defect).

pub mod output;
pub mod plan;
pub mod types;
pub mod validate;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use plinth_pipeline::{ManifestSource, ParseError, PipelineError, ValidationOrchestrator};
use plinth_schema::SchemaValidator;

/// Exit code for an invalid manifest.
pub const EXIT_INVALID: u8 = 1;

/// Load the schema registry (embedded, or from `schema_dir`) and build
/// the orchestrator.
pub fn load_orchestrator(schema_dir: Option<&Path>) -> Result<ValidationOrchestrator> {
    let validator = match schema_dir {
        Some(dir) => SchemaValidator::from_dir(dir)
            .with_context(|| format!("failed to load schemas from {}", dir.display()))?,
        None => SchemaValidator::builtin().context("failed to load built-in schemas")?,
    };
    tracing::debug!(
        component_types = validator.component_types().len(),
        "loaded schema registry"
    );
    ValidationOrchestrator::new(Arc::new(validator)).context("component catalog is inconsistent")
}

/// Manifest source for a CLI path argument; `-` reads standard input.
pub fn manifest_source(path: &Path) -> Result<ManifestSource> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read manifest from stdin")?;
        return Ok(ManifestSource::text(text));
    }
    Ok(ManifestSource::path(path))
}

/// Report a pipeline failure.
///
/// Manifest problems are printed to stderr and yield [`EXIT_INVALID`];
/// I/O failures and builder defects propagate as errors.
pub fn report_failure(err: PipelineError) -> Result<u8> {
    if matches!(err, PipelineError::Parse(ParseError::Io { .. })) || !err.is_user_error() {
        return Err(err.into());
    }
    eprintln!("{} stage failed: {err}", err.stage());
    Ok(EXIT_INVALID)
}
