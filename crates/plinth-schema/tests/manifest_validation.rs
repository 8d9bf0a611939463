//! Manifest validation against the built-in registry.

use std::path::PathBuf;

use plinth_schema::{SchemaValidationError, SchemaValidator, Violation};
use serde_json::{json, Value};

fn validator() -> SchemaValidator {
    SchemaValidator::builtin().unwrap()
}

fn violations(doc: &Value) -> Vec<Violation> {
    match validator().validate_manifest(doc) {
        Ok(()) => Vec::new(),
        Err(SchemaValidationError::ValidationFailed { violations, .. }) => violations.into_inner(),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn three_independent_violations_reported_together() {
    let doc = json!({
        "service": "BILLING",
        "components": [{
            "name": "db",
            "type": "ec2-instance",
            "config": {"storage": {"sizeGb": 99999}}
        }]
    });
    let found = violations(&doc);
    let summary: Vec<(&str, &str)> = found
        .iter()
        .map(|v| (v.instance_path.as_str(), v.keyword.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("", "required"),
            ("/components/0/config/storage/sizeGb", "maximum"),
            ("/service", "pattern"),
        ]
    );
    assert!(found[0].message.contains("owner"));
    assert_eq!(found[1].actual, json!(99999));
    assert_eq!(found[2].actual, json!("BILLING"));
}

#[test]
fn strings_are_not_coerced_to_numbers() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "components": [{
            "name": "db",
            "type": "rds-postgres",
            "config": {"allocatedStorageGb": "20"}
        }]
    });
    let found = violations(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instance_path, "/components/0/config/allocatedStorageGb");
    assert_eq!(found[0].keyword, "type");
}

#[test]
fn unregistered_component_type_rejected() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "components": [{"name": "db", "type": "mainframe"}]
    });
    let found = violations(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instance_path, "/components/0/type");
    assert_eq!(found[0].keyword, "enum");
}

#[test]
fn unknown_config_key_rejected_per_type() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "components": [
            {"name": "db", "type": "ec2-instance", "config": {"bucketName": "x"}},
            {"name": "files", "type": "s3-bucket", "config": {"bucketName": "billing-files"}}
        ]
    });
    let found = violations(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instance_path, "/components/0/config");
    assert_eq!(found[0].keyword, "additionalProperties");
}

#[test]
fn binding_with_both_targets_rejected() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "components": [
            {"name": "db", "type": "rds-postgres"},
            {
                "name": "api",
                "type": "lambda-api",
                "binds": [{"to": "db", "select": {"type": "rds-postgres"}, "capability": "db:postgres"}]
            }
        ]
    });
    let found = violations(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instance_path, "/components/1/binds/0");
    assert_eq!(found[0].keyword, "oneOf");
}

#[test]
fn environment_dependent_config_is_deferred() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "environments": {
            "dev": {"defaults": {"DISK": 20}},
            "prod": {"defaults": {"DISK": 200}}
        },
        "components": [{
            "name": "db",
            "type": "ec2-instance",
            "config": {
                "instanceType": {"dev": "t3.micro", "prod": "m5.large"},
                "storage": {"sizeGb": "${env:DISK}", "volumeType": "gp3"},
                "monitoring": {"detailed": "${envIs:prod}"}
            }
        }]
    });
    assert!(violations(&doc).is_empty());
}

#[test]
fn non_deferred_siblings_still_validated() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "environments": {"prod": {}},
        "components": [{
            "name": "db",
            "type": "ec2-instance",
            "config": {
                "storage": {"sizeGb": "${env:DISK}", "volumeType": "floppy"}
            }
        }]
    });
    let found = violations(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instance_path, "/components/0/config/storage/volumeType");
}

#[test]
fn environment_branches_validated_in_place() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "environments": {"prod": {}, "dev": {}},
        "components": [{
            "name": "db",
            "type": "ec2-instance",
            "config": {
                "storage": {"sizeGb": {"prod": 99999, "dev": 99999}},
                "instanceType": {"prod": "z9.huge", "dev": "t3.micro"}
            }
        }]
    });
    let found = violations(&doc);
    let keys: Vec<(&str, &str)> = found
        .iter()
        .map(|v| (v.instance_path.as_str(), v.keyword.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("/components/0/config/instanceType/prod", "enum"),
            ("/components/0/config/storage/sizeGb/dev", "maximum"),
            ("/components/0/config/storage/sizeGb/prod", "maximum"),
        ]
    );
}

#[test]
fn shared_violations_reported_once_across_environments() {
    let doc = json!({
        "service": "billing",
        "owner": "team-x",
        "environments": {"prod": {}, "dev": {}},
        "components": [{
            "name": "db",
            "type": "ec2-instance",
            "config": {
                "instanceType": {"prod": "m5.large", "dev": "t3.micro"},
                "storage": {"volumeType": "floppy"}
            }
        }]
    });
    let found = violations(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].instance_path, "/components/0/config/storage/volumeType");
}

#[test]
fn schema_directory_matches_builtin_set() {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas");
    let from_dir = SchemaValidator::from_dir(&dir).unwrap();
    assert_eq!(from_dir.manifest_schema(), validator().manifest_schema());
    assert_eq!(
        from_dir.component_types().names().collect::<Vec<_>>(),
        validator().component_types().names().collect::<Vec<_>>()
    );
}

#[test]
fn error_display_lists_every_violation() {
    let err = validator()
        .validate_manifest(&json!({"service": "Bad Name"}))
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("2 violation(s)"), "{text}");
    assert!(text.contains("(root)"), "{text}");
    assert!(text.contains("/service"), "{text}");
}
