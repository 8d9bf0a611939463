//! # Stages and Warnings
//!
//! Warnings are advisory only: they never describe a constraint
//! violation, and a run that produces warnings still succeeds.

use serde::Serialize;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Manifest parsing.
    Parse,
    /// Schema validation.
    Schema,
    /// Context hydration.
    Hydrate,
    /// Reference validation.
    References,
    /// Configuration building.
    Build,
}

impl Stage {
    /// Stage name as shown to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Schema => "schema",
            Self::Hydrate => "hydrate",
            Self::References => "references",
            Self::Build => "build",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-blocking advisory information from one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Stage that raised it.
    pub stage: Stage,
    /// JSON pointer into the manifest, `""` for the whole document.
    pub path: String,
    /// What the author may want to look at.
    pub message: String,
}

impl Warning {
    /// Construct a warning.
    pub fn new(stage: Stage, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}] {}", self.stage, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.stage, self.path, self.message)
        }
    }
}
