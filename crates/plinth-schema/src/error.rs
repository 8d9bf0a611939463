//! # Catalog Errors
//!
//! Defects in the read-only data loaded at startup: schema documents, the
//! component-type annotations, and (via `plinth-config`) the compliance
//! table. A `CatalogError` never describes a problem in a user's manifest;
//! it means the platform itself shipped inconsistent data and the process
//! should refuse to start.

use std::path::PathBuf;

use thiserror::Error;

/// Startup data defect.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A registry file or directory could not be read.
    #[error("cannot read schema registry at {path}: {source}")]
    Io {
        /// File or directory that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A registry document is not valid JSON.
    #[error("schema document '{document}' is not valid JSON: {reason}")]
    InvalidJson {
        /// Registry key of the document.
        document: String,
        /// Parser message.
        reason: String,
    },

    /// A required document is absent from the registry.
    #[error("schema document '{0}' is not in the registry")]
    MissingDocument(String),

    /// A `$ref` uses a form the registry does not resolve locally.
    #[error("unsupported $ref '{reference}' in '{document}': only local pointers, relative files, and https://schemas.plinth.dev/v1/ URIs resolve")]
    UnsupportedRef {
        /// Document containing the reference.
        document: String,
        /// The reference as written.
        reference: String,
    },

    /// A `$ref` fragment points at nothing.
    #[error("$ref target '{document}#{pointer}' does not exist")]
    UnresolvedPointer {
        /// Target document.
        document: String,
        /// JSON pointer inside the target.
        pointer: String,
    },

    /// `$ref` expansion revisited a target already on the expansion stack.
    #[error("$ref cycle: {}", chain.join(" -> "))]
    RefCycle {
        /// Targets from the outermost reference to the repeated one.
        chain: Vec<String>,
    },

    /// A component schema carries malformed `x-*` annotations.
    #[error("component schema '{document}' is malformed: {reason}")]
    InvalidComponentSchema {
        /// Registry key of the component schema.
        document: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two schemas declare the same `x-component-type`.
    #[error("component type '{0}' is declared by more than one schema")]
    DuplicateComponentType(String),

    /// A ref-free schema failed to compile.
    #[error("schema '{schema}' failed to compile: {reason}")]
    Compile {
        /// Schema identifier.
        schema: String,
        /// Compiler message.
        reason: String,
    },

    /// Registry data disagrees with itself (e.g. a locked path with no
    /// mandated value, or a fallback that violates its own schema).
    #[error("inconsistent catalog data in {what}: {reason}")]
    Inconsistent {
        /// The table or type the defect was found in.
        what: String,
        /// Description of the disagreement.
        reason: String,
    },
}
