//! # plinth CLI entry point
//!
//! Parses command-line arguments, installs logging, and dispatches to the
//! subcommand handlers in the library crate.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plinth_cli::output::OutputFormat;
use plinth_cli::plan::{run_plan, run_resolve, PlanArgs};
use plinth_cli::types::run_types;
use plinth_cli::validate::{run_validate, ValidateArgs};

/// Exit code for internal and I/O errors.
const EXIT_INTERNAL: u8 = 2;

/// plinth: service manifest validation and configuration resolution.
#[derive(Parser, Debug)]
#[command(name = "plinth", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Load schemas from this directory instead of the built-in set.
    #[arg(long, global = true, value_name = "DIR")]
    schema_dir: Option<PathBuf>,

    /// Output format for command results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a manifest and check it against the schema registry.
    Validate(ValidateArgs),

    /// Validate, hydrate for an environment, and resolve bindings.
    Plan(PlanArgs),

    /// Plan, then resolve every component's configuration.
    Resolve(PlanArgs),

    /// List registered component types.
    Types,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "plinth CLI starting");

    let schema_dir = cli.schema_dir.as_deref();
    let result = match &cli.command {
        Commands::Validate(args) => run_validate(args, schema_dir),
        Commands::Plan(args) => run_plan(args, schema_dir, cli.format),
        Commands::Resolve(args) => run_resolve(args, schema_dir, cli.format),
        Commands::Types => run_types(schema_dir, cli.format),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
