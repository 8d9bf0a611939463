//! # plinth-config: Configuration Precedence Engine
//!
//! Turns one component spec plus the service-wide [`BuildContext`] into a
//! [`ResolvedConfig`]: a complete, schema-valid, compliance-hardened
//! configuration tree for synthesis.
//!
//! ## Layers
//!
//! Six [`ConfigLayer`]s are folded lowest first. Objects merge per key;
//! scalars and arrays from a higher layer replace the lower value
//! outright. The last layer, `PolicyOverride`, re-asserts mandated values
//! at every path the component schema marks `x-locked-by` the active
//! framework, so component config cannot weaken a compliance control.
//!
//! ## Data
//!
//! - [`ComplianceTable`]: embedded `defaults/compliance.yaml`.
//! - [`ComponentDefaults`]: per-type baselines and naming, in code.
//! - Schemas, capabilities and locks come from `plinth-schema`.
//!
//! All of it is loaded once and checked for consistency in
//! [`ConfigBuilder::new`].
//!
//! ## Crate Policy
//!
//! - `build` is synchronous, pure, and side-effect free apart from logs.
//! - User-facing failures ([`BuildError`]) and builder defects
//!   ([`BuilderInternalError`]) are never conflated.

pub mod builder;
pub mod compliance;
pub mod components;
pub mod context;
pub mod error;
pub mod layers;
pub mod platform;
pub mod resolved;

pub use builder::ConfigBuilder;
pub use compliance::ComplianceTable;
pub use components::{builtin_defaults, ComponentDefaults};
pub use context::BuildContext;
pub use error::{BuildError, BuilderInternalError};
pub use layers::ConfigLayer;
pub use resolved::{PolicyEnforcement, ResolvedConfig};
