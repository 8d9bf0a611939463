//! # Plan and Resolve Subcommands
//!
//! `plan` prints the manifest hydrated for one environment together with
//! its resolved bindings; `resolve` additionally prints every component's
//! resolved configuration.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::output::{emit, OutputFormat};
use crate::{manifest_source, report_failure};

/// Arguments shared by `plinth plan` and `plinth resolve`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Manifest file (`.yaml`, `.yml`, `.json`), or `-` for stdin.
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Target environment (e.g. `prod`).
    #[arg(short, long = "env", value_name = "ENV")]
    pub environment: String,
}

/// Execute the plan subcommand.
pub fn run_plan(args: &PlanArgs, schema_dir: Option<&Path>, format: OutputFormat) -> Result<u8> {
    let orchestrator = crate::load_orchestrator(schema_dir)?;
    match orchestrator.plan(&manifest_source(&args.manifest)?, &args.environment) {
        Ok(plan) => {
            emit(&plan, format)?;
            Ok(0)
        }
        Err(e) => report_failure(e),
    }
}

/// Execute the resolve subcommand.
pub fn run_resolve(args: &PlanArgs, schema_dir: Option<&Path>, format: OutputFormat) -> Result<u8> {
    let orchestrator = crate::load_orchestrator(schema_dir)?;
    match orchestrator.resolve(&manifest_source(&args.manifest)?, &args.environment) {
        Ok(outcome) => {
            tracing::info!(
                service = %outcome.plan.manifest.service,
                environment = %outcome.plan.environment,
                configs = outcome.configs.len(),
                "resolved"
            );
            emit(&outcome, format)?;
            Ok(0)
        }
        Err(e) => report_failure(e),
    }
}
