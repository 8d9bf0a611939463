//! # plinth-core: Foundational Types for the Manifest Pipeline
//!
//! This crate defines the data model every other plinth crate speaks:
//! the parsed service manifest, its components and bindings, the compliance
//! framework tiers, and the generic configuration tree used by the
//! precedence engine. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Bindings are a tagged union.** A binding targets a component either
//!    directly by name or through a label selector, never both. The
//!    [`BindingTarget`] enum makes the "exactly one of `to`/`select`" rule a
//!    construction-time invariant instead of an ad hoc runtime check.
//!
//! 2. **Component names are validated newtypes.** [`ComponentName`] can only
//!    be built from strings matching `^[a-z0-9-]+$`.
//!
//! 3. **One `ComplianceFramework` enum.** Exhaustive `match` everywhere, so a
//!    new tier forces every compliance table and lock list to handle it.
//!
//! 4. **Configuration is a plain JSON tree.** The precedence engine folds
//!    ordered layers with [`value::deep_merge`]; arrays and scalars are
//!    replaced, objects merge per key.
//!
//! 5. **Deterministic bytes.** Resolved configuration is serialized through
//!    [`CanonicalBytes`] (RFC 8785) before digesting, so two identical builds
//!    always produce identical digests.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `plinth-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod binding;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod framework;
pub mod manifest;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use binding::{AccessLevel, Binding, BindingTarget, LabelSelector};
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, ModelError};
pub use framework::ComplianceFramework;
pub use manifest::{ComponentName, ComponentSpec, EnvironmentSpec, ServiceManifest};
