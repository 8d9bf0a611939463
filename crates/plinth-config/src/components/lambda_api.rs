use serde_json::{json, Value};

use super::ComponentDefaults;

/// `lambda-api`: a REST API backed by a function.
#[derive(Debug, Clone, Copy, Default)]
pub struct LambdaApi;

impl ComponentDefaults for LambdaApi {
    fn component_type(&self) -> &'static str {
        "lambda-api"
    }

    fn fallback(&self) -> Value {
        json!({
            "runtime": "nodejs20.x",
            "handler": "index.handler",
            "memorySizeMb": 128,
            "timeoutSeconds": 3,
            "tracing": {"enabled": false},
            "logging": {"retentionDays": 7, "level": "INFO"},
            "environmentEncryption": {"enabled": false},
            "tags": {}
        })
    }
}
