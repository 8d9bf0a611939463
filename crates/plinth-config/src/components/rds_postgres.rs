use plinth_core::ComponentName;
use serde_json::{json, Value};

use super::{sanitize, ComponentDefaults};
use crate::context::BuildContext;

/// PostgreSQL identifiers are at most 63 bytes.
const MAX_DATABASE_NAME: usize = 63;

/// `rds-postgres`: a managed PostgreSQL instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct RdsPostgres;

impl ComponentDefaults for RdsPostgres {
    fn component_type(&self) -> &'static str {
        "rds-postgres"
    }

    fn fallback(&self) -> Value {
        json!({
            "engineVersion": "16",
            "instanceClass": "db.t3.micro",
            "allocatedStorageGb": 20,
            "multiAz": false,
            "storageEncrypted": false,
            "backupRetentionDays": 1,
            "deletionProtection": false,
            "iamAuthentication": false,
            "tags": {}
        })
    }

    /// `databaseName` derived from the service name.
    fn naming(&self, ctx: &BuildContext, _component: &ComponentName) -> Value {
        json!({"databaseName": database_name(&ctx.service)})
    }
}

fn database_name(service: &str) -> String {
    let mut name = sanitize(service, |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_', '_');
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name.insert_str(0, "db_");
    }
    name.truncate(MAX_DATABASE_NAME);
    name
}
