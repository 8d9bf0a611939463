use plinth_core::ComponentName;
use serde_json::{json, Value};

use super::{sanitize, ComponentDefaults};
use crate::context::BuildContext;

/// S3 bucket names are at most 63 characters.
const MAX_BUCKET_NAME: usize = 63;

/// `s3-bucket`: an object storage bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Bucket;

impl ComponentDefaults for S3Bucket {
    fn component_type(&self) -> &'static str {
        "s3-bucket"
    }

    fn fallback(&self) -> Value {
        json!({
            "versioned": false,
            "encryption": {"enabled": false, "algorithm": "AES256"},
            "publicAccess": {"blockAll": true},
            "accessLogging": {"enabled": false},
            "tags": {}
        })
    }

    /// `bucketName` = `{service}-{component}-{environment}`.
    fn naming(&self, ctx: &BuildContext, component: &ComponentName) -> Value {
        match bucket_name(&ctx.service, component.as_str(), &ctx.environment) {
            Some(name) => json!({"bucketName": name}),
            None => json!({}),
        }
    }
}

fn bucket_name(service: &str, component: &str, environment: &str) -> Option<String> {
    let raw = format!("{service}-{component}-{environment}");
    let mut name = sanitize(&raw, |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-', '-');
    name.truncate(MAX_BUCKET_NAME);
    let name = name.trim_matches('-');
    (name.len() >= 3).then(|| name.to_string())
}
