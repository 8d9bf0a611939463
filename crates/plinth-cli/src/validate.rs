//! # Validate Subcommand
//!
//! Parse and schema-check a manifest. Warnings go to the log; stdout gets
//! a one-line verdict.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::{manifest_source, report_failure};

/// Arguments for `plinth validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest file (`.yaml`, `.yml`, `.json`), or `-` for stdin.
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs, schema_dir: Option<&Path>) -> Result<u8> {
    let orchestrator = crate::load_orchestrator(schema_dir)?;
    match orchestrator.validate(&manifest_source(&args.manifest)?) {
        Ok(outcome) => {
            println!(
                "{}: ok ({} component(s), {} warning(s))",
                outcome.manifest.service,
                outcome.manifest.components.len(),
                outcome.warnings.len()
            );
            Ok(0)
        }
        Err(e) => report_failure(e),
    }
}
