//! # plinth-pipeline: Manifest Resolution Pipeline
//!
//! Takes a service manifest from text to resolved, per-component
//! configuration:
//!
//! 1. [`parser`]: YAML or JSON text into a generic tree.
//! 2. Schema validation (`plinth-schema`), every violation in one report.
//! 3. [`hydrate`]: specialize the manifest for one target environment.
//! 4. [`references`]: resolve bindings into a [`BindingGraph`].
//! 5. Configuration building (`plinth-config`) for every component.
//!
//! [`ValidationOrchestrator`] sequences the stages. Each stage is a pure
//! function over its input; the only shared state is the immutable,
//! `Arc`-shared schema validator and config builder loaded at startup.
//!
//! ## Crate Policy
//!
//! - A stage never runs after an earlier stage failed.
//! - Stage errors surface unchanged inside [`PipelineError`].
//! - Warnings are advisory and never fail a run.

pub mod diagnostics;
pub mod hydrate;
pub mod orchestrator;
pub mod parser;
pub mod references;

pub use diagnostics::{Stage, Warning};
pub use hydrate::{hydrate, Hydration};
pub use orchestrator::{
    BuildErrors, PipelineError, PlanOutcome, ResolutionOutcome, ValidationOrchestrator, ValidationOutcome,
};
pub use parser::{parse, parse_text, ManifestFormat, ManifestSource, ParseError, ParsedDocument};
pub use references::{
    validate_references, BindingEdge, BindingGraph, CapabilityCatalog, ReferenceError, ReferenceErrorKind,
    UnresolvedReference,
};
