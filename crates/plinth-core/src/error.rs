//! # Error Types
//!
//! Errors raised while constructing the core model. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! Stage-level errors (parse, schema, reference, build) live in the crates
//! that own those stages; this module only covers invariants the model
//! enforces on construction.

use thiserror::Error;

/// A model invariant was violated while constructing a typed value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Component name does not match `^[a-z0-9-]+$`.
    #[error("invalid component name {0:?}: must match ^[a-z0-9-]+$")]
    InvalidComponentName(String),

    /// A binding declared both `to` and `select`.
    #[error("binding declares both `to` and `select`; exactly one is allowed")]
    AmbiguousBindingTarget,

    /// A binding declared neither `to` nor `select`.
    #[error("binding declares neither `to` nor `select`; exactly one is required")]
    MissingBindingTarget,

    /// Unrecognized compliance framework identifier.
    #[error("unknown compliance framework {0:?}: expected commercial, fedramp-moderate, or fedramp-high")]
    UnknownComplianceFramework(String),

    /// Unrecognized binding access level.
    #[error("unknown access level {0:?}: expected read, write, readwrite, or admin")]
    UnknownAccessLevel(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
