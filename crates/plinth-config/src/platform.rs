//! # Platform Defaults
//!
//! Layer 3: conventions applied to every component regardless of
//! compliance tier.
//!
//! ## Tags
//!
//! When the type has a top-level `tags` property, it receives, in
//! increasing precedence: service labels, component labels, then the
//! standard keys `service`, `owner`, `environment`, `component`,
//! `component-type` and `compliance-framework`.
//!
//! ## Naming
//!
//! Per-type conventions from [`ComponentDefaults::naming`] are merged on
//! top (e.g. the S3 bucket name).

use plinth_core::value::deep_merge;
use plinth_core::ComponentSpec;
use plinth_schema::ComponentType;
use serde_json::{Map, Value};

use crate::components::ComponentDefaults;
use crate::context::BuildContext;

/// Build layer 3 for one component.
pub fn platform_defaults(
    ctx: &BuildContext,
    spec: &ComponentSpec,
    component_type: &ComponentType,
    defaults: &dyn ComponentDefaults,
) -> Value {
    let mut layer = Value::Object(Map::new());

    if component_type.top_level_properties().contains(&"tags") {
        let mut tags = Map::new();
        for (key, value) in ctx.service_labels.iter().chain(spec.labels.iter()) {
            tags.insert(key.clone(), Value::String(value.clone()));
        }
        let standard = [
            ("service", ctx.service.as_str()),
            ("owner", ctx.owner.as_str()),
            ("environment", ctx.environment.as_str()),
            ("component", spec.name.as_str()),
            ("component-type", spec.component_type.as_str()),
            ("compliance-framework", ctx.compliance_framework.as_str()),
        ];
        for (key, value) in standard {
            tags.insert(key.to_string(), Value::String(value.to_string()));
        }
        deep_merge(&mut layer, &serde_json::json!({ "tags": tags }));
    }

    deep_merge(&mut layer, &defaults.naming(ctx, &spec.name));
    layer
}
