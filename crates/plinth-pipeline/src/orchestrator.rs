//! # Validation Orchestrator
//!
//! Runs the pipeline stages in order:
//!
//! ```text
//! validate: parse → schema
//! plan:     validate → hydrate → schema (hydrated config) → references
//! resolve:  plan → build (every component)
//! ```
//!
//! Fail-fast between stages, fail-slow within a stage: the first failing
//! stage's error is returned unchanged inside [`PipelineError`], and no
//! later stage runs. The orchestrator keeps no state between runs; the
//! compiled schemas and builder it holds are immutable and shared.

use std::sync::Arc;

use plinth_config::{BuildContext, BuildError, BuilderInternalError, ConfigBuilder, ResolvedConfig};
use plinth_core::ServiceManifest;
use plinth_schema::{CatalogError, SchemaValidationError, SchemaValidator, ValidationViolations, Violation, MANIFEST_SCHEMA};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::diagnostics::{Stage, Warning};
use crate::hydrate::hydrate;
use crate::parser::{parse, ManifestSource, ParseError};
use crate::references::{validate_references, BindingGraph, ReferenceError};

/// User-facing build failures of every component that failed.
#[derive(Error, Debug)]
#[error("{} component(s) failed to build:\n{}", .errors.len(), render(.errors))]
pub struct BuildErrors {
    /// One entry per failed component, in declaration order.
    pub errors: Vec<BuildError>,
}

fn render(errors: &[BuildError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}

/// The first stage failure of a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The manifest text is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The manifest violates its schema.
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    /// Bindings do not resolve.
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// One or more components supplied invalid configuration.
    #[error(transparent)]
    Build(#[from] BuildErrors),

    /// Builder defect. Never caused by manifest content alone.
    #[error(transparent)]
    Internal(#[from] BuilderInternalError),
}

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Parse(_) => Stage::Parse,
            Self::Schema(_) => Stage::Schema,
            Self::Reference(_) => Stage::References,
            Self::Build(_) | Self::Internal(_) => Stage::Build,
        }
    }

    /// Returns true if the manifest author can fix this.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

/// Result of [`ValidationOrchestrator::validate`].
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// The decoded, schema-valid manifest.
    pub manifest: ServiceManifest,
    /// Advisory warnings.
    pub warnings: Vec<Warning>,
}

/// Result of [`ValidationOrchestrator::plan`].
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    /// Target environment.
    pub environment: String,
    /// The manifest hydrated for `environment`.
    pub manifest: ServiceManifest,
    /// Resolved bindings.
    pub bindings: BindingGraph,
    /// Advisory warnings from every stage.
    pub warnings: Vec<Warning>,
}

/// Result of [`ValidationOrchestrator::resolve`].
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    /// The plan the configurations were built from.
    #[serde(flatten)]
    pub plan: PlanOutcome,
    /// One resolved configuration per component, in declaration order.
    pub configs: Vec<ResolvedConfig>,
}

impl ResolutionOutcome {
    /// Resolved configuration of `component`.
    pub fn config(&self, component: &str) -> Option<&ResolvedConfig> {
        self.configs.iter().find(|c| c.component.as_str() == component)
    }
}

/// Drives manifests through the pipeline.
#[derive(Debug, Clone)]
pub struct ValidationOrchestrator {
    validator: Arc<SchemaValidator>,
    builder: Arc<ConfigBuilder>,
}

impl ValidationOrchestrator {
    /// Orchestrator over `validator` with the built-in compliance table
    /// and component defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the builder's startup consistency
    /// check fails for the validator's component types.
    pub fn new(validator: Arc<SchemaValidator>) -> Result<Self, CatalogError> {
        let builder = Arc::new(ConfigBuilder::new(Arc::clone(&validator))?);
        Ok(Self { validator, builder })
    }

    /// Orchestrator over the built-in schema registry.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(Arc::new(SchemaValidator::builtin()?))
    }

    /// Orchestrator around an existing builder.
    pub fn with_builder(builder: Arc<ConfigBuilder>) -> Self {
        Self {
            validator: Arc::clone(builder.validator()),
            builder,
        }
    }

    /// The shared schema validator.
    pub fn validator(&self) -> &Arc<SchemaValidator> {
        &self.validator
    }

    /// The shared config builder.
    pub fn builder(&self) -> &Arc<ConfigBuilder> {
        &self.builder
    }

    /// Parse and schema-validate a manifest.
    pub fn validate(&self, source: &ManifestSource) -> Result<ValidationOutcome, PipelineError> {
        let document = parse(source)?;
        debug!(format = %document.format, "manifest parsed");

        self.validator.validate_manifest(&document.tree)?;
        let manifest: ServiceManifest = serde_json::from_value(document.tree).map_err(|e| {
            SchemaValidationError::ValidationFailed {
                schema: MANIFEST_SCHEMA.to_string(),
                violations: ValidationViolations::new(vec![Violation::root(
                    "model",
                    format!("manifest does not decode: {e}"),
                    serde_json::Value::Null,
                )]),
            }
        })?;
        debug!(service = %manifest.service, components = manifest.components.len(), "manifest schema-valid");

        let mut warnings = Vec::new();
        if manifest.components.is_empty() {
            warnings.push(Warning::new(Stage::Schema, "/components", "manifest declares no components"));
        }
        log_warnings(&warnings);
        Ok(ValidationOutcome { manifest, warnings })
    }

    /// Validate, hydrate for `environment`, and resolve bindings.
    pub fn plan(&self, source: &ManifestSource, environment: &str) -> Result<PlanOutcome, PipelineError> {
        let ValidationOutcome { manifest, mut warnings } = self.validate(source)?;

        let hydration = hydrate(&manifest, environment);
        log_warnings(&hydration.warnings);
        warnings.extend(hydration.warnings);
        self.check_hydrated_configs(&hydration.manifest)?;

        let bindings = validate_references(&hydration.manifest, self.validator.component_types())?;
        debug!(
            service = %hydration.manifest.service,
            environment,
            bindings = bindings.len(),
            "plan complete"
        );
        Ok(PlanOutcome {
            environment: environment.to_string(),
            manifest: hydration.manifest,
            bindings,
            warnings,
        })
    }

    /// Plan, then build every component's configuration.
    ///
    /// User-facing build errors of all components are collected into
    /// [`PipelineError::Build`]; a builder defect aborts immediately with
    /// [`PipelineError::Internal`].
    pub fn resolve(&self, source: &ManifestSource, environment: &str) -> Result<ResolutionOutcome, PipelineError> {
        let plan = self.plan(source, environment)?;
        let ctx = BuildContext::from_manifest(&plan.manifest, environment);

        let mut configs = Vec::with_capacity(plan.manifest.components.len());
        let mut errors = Vec::new();
        for component in &plan.manifest.components {
            match self.builder.build(&ctx, component) {
                Ok(resolved) => configs.push(resolved),
                Err(BuildError::Internal(e)) => return Err(PipelineError::Internal(e)),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            debug!(service = %ctx.service, failed = errors.len(), "build failed");
            return Err(BuildErrors { errors }.into());
        }

        debug!(service = %ctx.service, environment, configs = configs.len(), "resolution complete");
        Ok(ResolutionOutcome { plan, configs })
    }

    /// Check every hydrated `config` against its type's override schema.
    /// Catches values that only became concrete during hydration.
    fn check_hydrated_configs(&self, manifest: &ServiceManifest) -> Result<(), SchemaValidationError> {
        let mut raw = Vec::new();
        for (i, component) in manifest.components.iter().enumerate() {
            match self
                .validator
                .validate_component_override(&component.component_type, &component.config)
            {
                Ok(()) => {}
                Err(SchemaValidationError::ValidationFailed { violations, .. }) => {
                    let base = format!("/components/{i}/config");
                    raw.extend(violations.into_inner().into_iter().map(|v| v.under(&base)));
                }
                Err(e @ SchemaValidationError::UnknownComponentType(_)) => return Err(e),
            }
        }
        if raw.is_empty() {
            return Ok(());
        }
        debug!(service = %manifest.service, violations = raw.len(), "hydrated config invalid");
        Err(SchemaValidationError::ValidationFailed {
            schema: MANIFEST_SCHEMA.to_string(),
            violations: ValidationViolations::new(raw),
        })
    }
}

fn log_warnings(warnings: &[Warning]) {
    for w in warnings {
        warn!(stage = %w.stage, path = %w.path, "{}", w.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator() -> ValidationOrchestrator {
        ValidationOrchestrator::builtin().unwrap()
    }

    #[test]
    fn stage_of_each_error() {
        let o = orchestrator();
        let err = o.validate(&ManifestSource::text("service: [")).unwrap_err();
        assert_eq!(err.stage(), Stage::Parse);
        let err = o.validate(&ManifestSource::text("service: billing\n")).unwrap_err();
        assert_eq!(err.stage(), Stage::Schema);
        assert!(err.is_user_error());
    }

    #[test]
    fn empty_component_list_warns() {
        let outcome = orchestrator()
            .validate(&ManifestSource::text("service: billing\nowner: team-x\n"))
            .unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].path, "/components");
    }

    #[test]
    fn with_builder_shares_validator() {
        let o = orchestrator();
        let other = ValidationOrchestrator::with_builder(Arc::clone(o.builder()));
        assert!(Arc::ptr_eq(o.validator(), other.validator()));
    }
}
