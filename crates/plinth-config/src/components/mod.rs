//! # Per-Type Defaults
//!
//! Each built-in component type provides its layer-1 baseline and any
//! naming conventions the platform layer applies to it. Baselines are the
//! most conservative valid configuration: smallest sizes, shortest
//! retention, optional hardening off. Compliance tiers raise them.

mod ec2_instance;
mod lambda_api;
mod rds_postgres;
mod s3_bucket;

pub use ec2_instance::Ec2Instance;
pub use lambda_api::LambdaApi;
pub use rds_postgres::RdsPostgres;
pub use s3_bucket::S3Bucket;

use plinth_core::ComponentName;
use serde_json::{Map, Value};

use crate::context::BuildContext;

/// Hardcoded defaults for one component type.
pub trait ComponentDefaults: Send + Sync {
    /// Registered type name these defaults belong to.
    fn component_type(&self) -> &'static str;

    /// Layer 1: a complete configuration valid under the full schema.
    fn fallback(&self) -> Value;

    /// Naming conventions merged into layer 3.
    fn naming(&self, _ctx: &BuildContext, _component: &ComponentName) -> Value {
        Value::Object(Map::new())
    }
}

/// Defaults for every built-in type.
pub fn builtin_defaults() -> Vec<Box<dyn ComponentDefaults>> {
    vec![
        Box::new(Ec2Instance),
        Box::new(S3Bucket),
        Box::new(RdsPostgres),
        Box::new(LambdaApi),
    ]
}

/// Lowercase `raw` and replace every byte outside `allowed` with `fill`.
pub(crate) fn sanitize(raw: &str, allowed: impl Fn(char) -> bool, fill: char) -> String {
    raw.chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if allowed(c) { c } else { fill })
        .collect()
}
