//! # plinth-schema: Schema Registry & Validation
//!
//! Loads the versioned JSON Schema set a manifest is checked against and
//! turns it into compiled, shareable validators.
//!
//! ## Registry (`registry`)
//!
//! [`SchemaRegistry`] holds the schema documents, either the set embedded
//! in the binary or one loaded from a directory, and expands every `$ref`
//! once at load into a ref-free tree.
//!
//! ## Component Types (`components`)
//!
//! [`ComponentTypeRegistry`] reads the `x-component-type`,
//! `x-capabilities` and `x-locked-by` annotations of component schemas:
//! which types exist, what they expose, and which fields each compliance
//! framework locks.
//!
//! ## Validation (`validate`, `compose`)
//!
//! [`SchemaValidator`] composes the master manifest schema from the
//! registry and compiles validators for the manifest, each component's
//! full schema, and each component's override schema. Reports aggregate
//! every violation, coalesced and sorted.
//!
//! ## Crate Policy
//!
//! - Depends only on `plinth-core` internally.
//! - Schemas are immutable after load; no network retrieval ever happens.
//! - Schema validation is a trust boundary: invalid documents are rejected
//!   with structured errors including path, expected, and actual value.

pub mod components;
pub mod compose;
pub mod error;
pub mod registry;
pub mod validate;

pub use components::{ComponentType, ComponentTypeRegistry, PolicyLock};
pub use error::CatalogError;
pub use registry::{SchemaRegistry, MANIFEST_SCHEMA, SCHEMA_URI_PREFIX};
pub use validate::{is_deferred, SchemaValidationError, SchemaValidator, ValidationViolations, Violation};
