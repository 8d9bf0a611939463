//! # Build Errors
//!
//! Two classes:
//!
//! - [`BuildError`] variants other than `Internal` are the manifest
//!   author's problem (a layer they supplied violates the type's schema).
//! - [`BuilderInternalError`] means the builder or its catalog data is
//!   defective (the folded output failed the component's own schema). It
//!   must abort the run, never be reported as a validation finding.

use plinth_core::CanonicalizationError;
use plinth_schema::ValidationViolations;
use thiserror::Error;

use crate::layers::ConfigLayer;

/// Failure to build one component's configuration.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The component's type is not registered.
    #[error("component '{component}': type '{component_type}' is not registered")]
    UnknownComponentType {
        /// Component name.
        component: String,
        /// The unregistered type.
        component_type: String,
    },

    /// A user-supplied layer violates the type's override schema.
    #[error("component '{component}': {layer} layer is invalid:\n{violations}")]
    InvalidLayer {
        /// Component name.
        component: String,
        /// Which layer failed.
        layer: ConfigLayer,
        /// Every violation in that layer.
        violations: ValidationViolations,
    },

    /// Builder defect; aborts the run.
    #[error(transparent)]
    Internal(#[from] BuilderInternalError),
}

impl BuildError {
    /// Returns true if this error is a builder defect rather than a
    /// problem in the manifest.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// A defect in the builder or its catalog data.
#[derive(Error, Debug)]
pub enum BuilderInternalError {
    /// The folded configuration does not satisfy the component schema.
    #[error("internal error: resolved configuration for component '{component}' ({component_type}) violates its schema:\n{violations}")]
    SchemaInvalidOutput {
        /// Component name.
        component: String,
        /// Component type.
        component_type: String,
        /// Violations in the folded output.
        violations: ValidationViolations,
    },

    /// No fallback provider exists for a registered type.
    #[error("internal error: no fallback provider for component type '{0}'")]
    MissingProvider(String),

    /// A locked path has no mandated value.
    #[error("internal error: {framework} locks {pointer} on '{component_type}' but mandates no value")]
    MissingMandate {
        /// Framework that locks the path.
        framework: String,
        /// Component type.
        component_type: String,
        /// Locked pointer.
        pointer: String,
    },

    /// The schema engine refused a lookup for a type it registered.
    #[error("internal error: {0}")]
    Validator(String),

    /// Canonical serialization of the output failed.
    #[error("internal error: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}
