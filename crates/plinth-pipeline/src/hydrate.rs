//! # Context Hydration
//!
//! Specializes a validated manifest for one target environment. Returns a
//! new manifest; the input is never mutated.
//!
//! ## Rules
//!
//! Free-form trees (component `config`, `overrides` and `policy`, binding
//! `options`, manifest `governance` and `extensions`) are walked with all
//! four rules:
//!
//! 1. `${env:KEY}` inside a string is replaced by
//!    `environments[env].defaults[KEY]`. A string that is exactly one token
//!    takes the default's value with its JSON type; inside longer text the
//!    value is rendered inline. Unknown keys are left verbatim and reported
//!    as warnings.
//! 2. A string whose trimmed form is exactly `${envIs:NAME}` becomes the
//!    boolean `env == NAME`.
//! 3. An object with a key equal to `env` is replaced by that key's value,
//!    which is then hydrated itself.
//! 4. Arrays are walked element by element; other scalars are untouched.
//!
//! Typed string fields (`owner`, label values, selector `type` and label
//! values, binding `env` values) get rule 1 only and always stay strings.
//! The `environments` block is never rewritten.
//!
//! A value taken from the defaults is hydrated itself before it is
//! substituted, so defaults may refer to other defaults, use `${envIs:}`,
//! or be environment-keyed. A default that refers back to itself, or a
//! chain deeper than [`MAX_EXPANSION_DEPTH`], is left verbatim with a
//! warning. With complete, acyclic defaults one pass leaves no tokens,
//! and hydrating the result again changes nothing.

use std::collections::BTreeMap;

use plinth_core::value::{join_pointer, render_inline};
use plinth_core::{Binding, BindingTarget, ComplianceFramework, ServiceManifest};
use serde_json::{Map, Value};
use tracing::debug;

use crate::diagnostics::{Stage, Warning};

const ENV_TOKEN: &str = "${env:";
const ENV_IS_PREFIX: &str = "${envIs:";

/// Longest chain of defaults referring to other defaults.
pub const MAX_EXPANSION_DEPTH: usize = 8;

/// A manifest specialized for one environment, plus advisory warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Hydration {
    /// The hydrated copy.
    pub manifest: ServiceManifest,
    /// Undeclared environment, unresolved or cyclic tokens.
    pub warnings: Vec<Warning>,
}

/// Hydrate `manifest` for `environment`.
pub fn hydrate(manifest: &ServiceManifest, environment: &str) -> Hydration {
    let empty = Map::new();
    let mut warnings = Vec::new();
    let defaults = match manifest.environment_defaults(environment) {
        Some(defaults) => {
            if defaults.is_empty() {
                warnings.push(Warning::new(
                    Stage::Hydrate,
                    join_pointer("/environments", environment),
                    format!("environment '{environment}' declares no defaults"),
                ));
            }
            defaults
        }
        None => {
            warnings.push(Warning::new(
                Stage::Hydrate,
                "/environments",
                format!("environment '{environment}' is not declared; no environment defaults apply"),
            ));
            &empty
        }
    };

    let mut hydrator = Hydrator {
        environment,
        defaults,
        expanding: Vec::new(),
        warnings,
    };
    let mut out = manifest.clone();

    if out.compliance_framework.is_none() {
        out.compliance_framework = Some(ComplianceFramework::default());
    }
    out.owner = hydrator.text(&manifest.owner, "/owner");
    hydrator.labels(&mut out.labels, "/labels");

    for (i, component) in out.components.iter_mut().enumerate() {
        let base = format!("/components/{i}");
        component.config = hydrator.tree(&component.config, &join_pointer(&base, "config"));
        if let Some(overrides) = &component.overrides {
            component.overrides = Some(hydrator.tree(overrides, &join_pointer(&base, "overrides")));
        }
        if let Some(policy) = &component.policy {
            component.policy = Some(hydrator.tree(policy, &join_pointer(&base, "policy")));
        }
        hydrator.labels(&mut component.labels, &join_pointer(&base, "labels"));
        for (j, binding) in component.binds.iter_mut().enumerate() {
            hydrator.binding(binding, &format!("{base}/binds/{j}"));
        }
    }

    if let Some(governance) = &manifest.governance {
        out.governance = Some(hydrator.tree(governance, "/governance"));
    }
    if let Some(extensions) = &manifest.extensions {
        out.extensions = Some(hydrator.tree(extensions, "/extensions"));
    }

    debug!(
        service = %out.service,
        environment,
        warnings = hydrator.warnings.len(),
        "hydrated manifest"
    );
    Hydration {
        manifest: out,
        warnings: hydrator.warnings,
    }
}

struct Hydrator<'a> {
    environment: &'a str,
    defaults: &'a Map<String, Value>,
    /// Default keys currently being expanded, outermost first.
    expanding: Vec<&'a str>,
    warnings: Vec<Warning>,
}

impl Hydrator<'_> {
    fn tree(&mut self, value: &Value, path: &str) -> Value {
        match value {
            Value::String(s) => match env_is_target(s) {
                Some(name) => Value::Bool(name == self.environment),
                None => self.interpolate(s, path),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.tree(item, &format!("{path}/{i}")))
                    .collect(),
            ),
            Value::Object(map) => match map.get(self.environment) {
                Some(selected) => self.tree(selected, path),
                None => Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), self.tree(v, &join_pointer(path, k))))
                        .collect(),
                ),
            },
            other => other.clone(),
        }
    }

    fn binding(&mut self, binding: &mut Binding, path: &str) {
        if let BindingTarget::Selector(selector) = &mut binding.target {
            selector.component_type = self.text(&selector.component_type, &format!("{path}/select/type"));
            self.labels(&mut selector.with_labels, &format!("{path}/select/withLabels"));
        }
        self.labels(&mut binding.env, &join_pointer(path, "env"));
        if let Some(options) = &binding.options {
            binding.options = Some(self.tree(options, &join_pointer(path, "options")));
        }
    }

    fn labels(&mut self, labels: &mut BTreeMap<String, String>, path: &str) {
        for (key, value) in labels.iter_mut() {
            *value = self.text(value, &join_pointer(path, key));
        }
    }

    /// Rule 1 for a field that must remain a string.
    fn text(&mut self, s: &str, path: &str) -> String {
        match self.interpolate(s, path) {
            Value::String(out) => out,
            other => render_inline(&other),
        }
    }

    fn interpolate(&mut self, s: &str, path: &str) -> Value {
        if !s.contains(ENV_TOKEN) {
            return Value::String(s.to_string());
        }
        if let Some(key) = single_token(s) {
            return self
                .expand(key, path)
                .unwrap_or_else(|| Value::String(s.to_string()));
        }

        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(start) = rest.find(ENV_TOKEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + ENV_TOKEN.len()..];
            let Some(end) = after.find('}') else {
                // unterminated token, keep the tail verbatim
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            match self.expand(&after[..end], path) {
                Some(value) => out.push_str(&render_inline(&value)),
                None => out.push_str(&rest[start..start + ENV_TOKEN.len() + end + 1]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Value::String(out)
    }

    /// The hydrated default for `key`, or `None` (with a warning) when it
    /// is missing, cyclic, or nested too deeply.
    fn expand(&mut self, key: &str, path: &str) -> Option<Value> {
        let defaults = self.defaults;
        let Some((key, value)) = defaults.get_key_value(key) else {
            self.warn(
                path,
                format!(
                    "no default for ${{env:{key}}} in environment '{}'; left unresolved",
                    self.environment
                ),
            );
            return None;
        };
        if self.expanding.contains(&key.as_str()) {
            let chain = self.expanding.join(" -> ");
            self.warn(
                path,
                format!("default ${{env:{key}}} refers to itself ({chain} -> {key}); left unresolved"),
            );
            return None;
        }
        if self.expanding.len() >= MAX_EXPANSION_DEPTH {
            self.warn(
                path,
                format!(
                    "default ${{env:{key}}} is nested more than {MAX_EXPANSION_DEPTH} levels deep; left unresolved"
                ),
            );
            return None;
        }

        self.expanding.push(key.as_str());
        let hydrated = self.tree(value, path);
        self.expanding.pop();
        Some(hydrated)
    }

    fn warn(&mut self, path: &str, message: String) {
        self.warnings.push(Warning::new(Stage::Hydrate, path, message));
    }
}

/// `NAME` when `s` trimmed is exactly `${envIs:NAME}`.
fn env_is_target(s: &str) -> Option<&str> {
    let name = s.trim().strip_prefix(ENV_IS_PREFIX)?.strip_suffix('}')?;
    (!name.contains('}')).then_some(name)
}

/// `KEY` when `s` is exactly `${env:KEY}`.
fn single_token(s: &str) -> Option<&str> {
    let key = s.strip_prefix(ENV_TOKEN)?.strip_suffix('}')?;
    (!key.contains('}')).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(doc: Value) -> ServiceManifest {
        serde_json::from_value(doc).unwrap()
    }

    fn billing(config: Value) -> ServiceManifest {
        manifest(json!({
            "service": "billing",
            "owner": "team-x",
            "environments": {
                "prod": {"defaults": {"instanceType": "m5.large", "sizeGb": 100, "region": "us-east-1"}},
                "dev": {"defaults": {"instanceType": "t3.micro", "sizeGb": 20, "region": "us-west-2"}}
            },
            "components": [{"name": "db", "type": "ec2-instance", "config": config}]
        }))
    }

    #[test]
    fn single_token_keeps_json_type() {
        let h = hydrate(&billing(json!({"storage": {"sizeGb": "${env:sizeGb}"}})), "prod");
        assert_eq!(h.manifest.components[0].config["storage"]["sizeGb"], json!(100));
    }

    #[test]
    fn tokens_inside_text_are_rendered_inline() {
        let h = hydrate(
            &billing(json!({"name": "db-${env:region}-${env:sizeGb}gb"})),
            "dev",
        );
        assert_eq!(h.manifest.components[0].config["name"], "db-us-west-2-20gb");
    }

    #[test]
    fn unresolved_token_left_verbatim_with_warning() {
        let h = hydrate(&billing(json!({"arn": "arn:${env:accountId}:x"})), "prod");
        assert_eq!(h.manifest.components[0].config["arn"], "arn:${env:accountId}:x");
        let warning = h.warnings.iter().find(|w| w.path == "/components/0/config/arn").unwrap();
        assert!(warning.message.contains("accountId"));
        assert_eq!(warning.stage, Stage::Hydrate);
    }

    #[test]
    fn env_is_becomes_boolean() {
        let config = json!({"monitoring": {"detailed": "${envIs:prod}"}, "debug": " ${envIs:dev} "});
        let prod = hydrate(&billing(config.clone()), "prod");
        assert_eq!(prod.manifest.components[0].config["monitoring"]["detailed"], json!(true));
        assert_eq!(prod.manifest.components[0].config["debug"], json!(false));
        let dev = hydrate(&billing(config), "dev");
        assert_eq!(dev.manifest.components[0].config["debug"], json!(true));
    }

    #[test]
    fn env_is_inside_text_is_not_a_rule() {
        let h = hydrate(&billing(json!({"note": "on ${envIs:prod}"})), "prod");
        assert_eq!(h.manifest.components[0].config["note"], "on ${envIs:prod}");
    }

    #[test]
    fn environment_keyed_object_selects_branch() {
        let config = json!({"instanceType": {"prod": "m5.xlarge", "dev": "t3.small"}});
        let h = hydrate(&billing(config), "prod");
        assert_eq!(h.manifest.components[0].config["instanceType"], "m5.xlarge");
    }

    #[test]
    fn selected_branch_is_hydrated() {
        let config = json!({"storage": {"prod": {"sizeGb": "${env:sizeGb}", "encrypted": "${envIs:prod}"}}});
        let h = hydrate(&billing(config), "prod");
        assert_eq!(
            h.manifest.components[0].config["storage"],
            json!({"sizeGb": 100, "encrypted": true})
        );
    }

    #[test]
    fn object_without_environment_key_is_recursed() {
        let config = json!({"storage": {"dev": 1, "sizeGb": "${env:sizeGb}"}});
        let h = hydrate(&billing(config), "prod");
        assert_eq!(
            h.manifest.components[0].config["storage"],
            json!({"dev": 1, "sizeGb": 100})
        );
    }

    #[test]
    fn arrays_walked_elementwise() {
        let h = hydrate(&billing(json!({"zones": ["${env:region}a", 3, "${envIs:prod}"]})), "prod");
        assert_eq!(
            h.manifest.components[0].config["zones"],
            json!(["us-east-1a", 3, true])
        );
    }

    fn with_defaults(defaults: Value, config: Value) -> ServiceManifest {
        manifest(json!({
            "service": "billing",
            "owner": "team-x",
            "environments": {"prod": {"defaults": defaults}, "dev": {}},
            "components": [{"name": "db", "type": "ec2-instance", "config": config}]
        }))
    }

    #[test]
    fn substituted_defaults_are_hydrated() {
        let m = with_defaults(
            json!({
                "a": "${env:b}",
                "b": "x",
                "flag": "${envIs:prod}",
                "sizing": {"prod": "m5.large", "dev": "t3.small"}
            }),
            json!({"v": "pre-${env:a}", "f": "${env:flag}", "instanceType": "${env:sizing}"}),
        );
        let once = hydrate(&m, "prod");
        assert!(once.warnings.is_empty(), "{:?}", once.warnings);
        assert_eq!(
            once.manifest.components[0].config,
            json!({"v": "pre-x", "f": true, "instanceType": "m5.large"})
        );
        let twice = hydrate(&once.manifest, "prod");
        assert_eq!(twice.manifest, once.manifest);
    }

    #[test]
    fn cyclic_defaults_left_verbatim_with_warning() {
        let m = with_defaults(
            json!({"a": "${env:b}", "b": "x-${env:a}"}),
            json!({"v": "${env:a}"}),
        );
        let h = hydrate(&m, "prod");
        assert_eq!(h.manifest.components[0].config["v"], "x-${env:a}");
        let warning = h
            .warnings
            .iter()
            .find(|w| w.message.contains("refers to itself"))
            .unwrap();
        assert_eq!(warning.path, "/components/0/config/v");
        assert!(warning.message.contains("a -> b -> a"));
    }

    #[test]
    fn deep_default_chains_are_bounded() {
        let mut defaults = Map::new();
        for i in 0..=MAX_EXPANSION_DEPTH {
            defaults.insert(format!("k{i}"), Value::String(format!("${{env:k{}}}", i + 1)));
        }
        defaults.insert(format!("k{}", MAX_EXPANSION_DEPTH + 1), json!("end"));
        let h = hydrate(&with_defaults(Value::Object(defaults), json!({"v": "${env:k0}"})), "prod");
        assert!(h.warnings.iter().any(|w| w.message.contains("levels deep")));
        assert!(h.manifest.components[0].config["v"].as_str().unwrap().contains("${env:"));
    }

    #[test]
    fn typed_fields_stay_strings() {
        let m = manifest(json!({
            "service": "billing",
            "owner": "team-${env:team}",
            "labels": {"cost-center": "${env:costCenter}"},
            "environments": {"prod": {"defaults": {"team": "x", "costCenter": 4411, "dbType": "rds-postgres"}}},
            "components": [{
                "name": "api",
                "type": "lambda-api",
                "labels": {"stage": "${env:team}"},
                "binds": [{
                    "select": {"type": "${env:dbType}", "withLabels": {"team": "${env:team}"}},
                    "capability": "db:postgres",
                    "env": {"host": "DB_${env:team}_HOST"}
                }]
            }]
        }));
        let h = hydrate(&m, "prod");
        assert_eq!(h.manifest.owner, "team-x");
        assert_eq!(h.manifest.labels["cost-center"], "4411");
        let api = &h.manifest.components[0];
        assert_eq!(api.labels["stage"], "x");
        assert_eq!(api.binds[0].env["host"], "DB_x_HOST");
        match &api.binds[0].target {
            BindingTarget::Selector(sel) => {
                assert_eq!(sel.component_type, "rds-postgres");
                assert_eq!(sel.with_labels["team"], "x");
            }
            other => panic!("expected selector, got {other}"),
        }
    }

    #[test]
    fn passthrough_trees_are_hydrated() {
        let m = manifest(json!({
            "service": "billing",
            "owner": "team-x",
            "environments": {"prod": {"defaults": {"region": "us-east-1"}}},
            "governance": {"review": {"prod": "required", "dev": "optional"}},
            "extensions": {"region": "${env:region}"},
            "components": [{
                "name": "db",
                "type": "rds-postgres",
                "overrides": {"alarms": "${envIs:prod}"},
                "policy": {"retention": {"prod": 35}}
            }]
        }));
        let h = hydrate(&m, "prod");
        assert_eq!(h.manifest.governance, Some(json!({"review": "required"})));
        assert_eq!(h.manifest.extensions, Some(json!({"region": "us-east-1"})));
        assert_eq!(h.manifest.components[0].overrides, Some(json!({"alarms": true})));
        assert_eq!(h.manifest.components[0].policy, Some(json!({"retention": 35})));
    }

    #[test]
    fn environments_block_untouched() {
        let m = billing(json!({}));
        let h = hydrate(&m, "prod");
        assert_eq!(h.manifest.environments, m.environments);
    }

    #[test]
    fn input_is_not_mutated() {
        let m = billing(json!({"instanceType": {"prod": "m5.xlarge"}}));
        let before = m.clone();
        let _ = hydrate(&m, "prod");
        assert_eq!(m, before);
    }

    #[test]
    fn framework_defaults_to_commercial() {
        let h = hydrate(&billing(json!({})), "prod");
        assert_eq!(h.manifest.compliance_framework, Some(ComplianceFramework::Commercial));

        let mut regulated = billing(json!({}));
        regulated.compliance_framework = Some(ComplianceFramework::FedrampHigh);
        let h = hydrate(&regulated, "prod");
        assert_eq!(h.manifest.compliance_framework, Some(ComplianceFramework::FedrampHigh));
    }

    #[test]
    fn undeclared_environment_warns() {
        let h = hydrate(&billing(json!({"size": "${env:sizeGb}"})), "staging");
        assert!(h.warnings.iter().any(|w| w.path == "/environments" && w.message.contains("staging")));
        assert_eq!(h.manifest.components[0].config["size"], "${env:sizeGb}");
    }

    #[test]
    fn unterminated_token_kept() {
        let h = hydrate(&billing(json!({"v": "x-${env:region"})), "prod");
        assert_eq!(h.manifest.components[0].config["v"], "x-${env:region");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const KEYS: &[&str] = &["region", "size", "tier", "zone"];

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::from),
            "[a-z0-9-]{0,8}".prop_map(Value::String),
        ]
    }

    /// A default that may refer only to `later` keys, so chains stay acyclic.
    fn default_value(later: Vec<&'static str>) -> BoxedStrategy<Value> {
        let env_keyed = (scalar(), scalar()).prop_map(|(p, d)| serde_json::json!({"prod": p, "dev": d}));
        let flag = prop::sample::select(vec!["prod", "dev"])
            .prop_map(|e| Value::String(format!("${{envIs:{e}}}")));
        if later.is_empty() {
            return prop_oneof![scalar(), env_keyed, flag].boxed();
        }
        let reference = (prop::sample::select(later), "[a-z]{0,3}").prop_map(|(k, s)| {
            if s.is_empty() {
                Value::String(format!("${{env:{k}}}"))
            } else {
                Value::String(format!("{s}-${{env:{k}}}"))
            }
        });
        prop_oneof![scalar(), env_keyed, flag, reference].boxed()
    }

    fn defaults() -> impl Strategy<Value = Map<String, Value>> {
        (
            default_value(KEYS[1..].to_vec()),
            default_value(KEYS[2..].to_vec()),
            default_value(KEYS[3..].to_vec()),
            default_value(Vec::new()),
        )
            .prop_map(|(a, b, c, d)| {
                KEYS.iter().map(|k| k.to_string()).zip([a, b, c, d]).collect()
            })
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i32>().prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::String),
            prop::sample::select(KEYS).prop_map(|k| Value::String(format!("${{env:{k}}}"))),
            (prop::sample::select(KEYS), "[a-z]{1,4}")
                .prop_map(|(k, s)| Value::String(format!("{s}-${{env:{k}}}"))),
            prop::sample::select(vec!["prod", "dev"])
                .prop_map(|e| Value::String(format!("${{envIs:{e}}}"))),
        ]
    }

    fn config_tree() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Array),
                prop::collection::btree_map(
                    prop::sample::select(vec!["a", "b", "c", "prod", "dev"]).prop_map(String::from),
                    inner,
                    0..4
                )
                .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// With complete defaults, a second pass changes nothing.
        #[test]
        fn hydration_is_idempotent(defaults in defaults(), config in config_tree()) {
            let m: ServiceManifest = serde_json::from_value(serde_json::json!({
                "service": "billing",
                "owner": "team-x",
                "environments": {"prod": {"defaults": defaults}},
                "components": [{"name": "db", "type": "ec2-instance", "config": config}]
            })).unwrap();
            let once = hydrate(&m, "prod").manifest;
            let twice = hydrate(&once, "prod").manifest;
            prop_assert_eq!(&once, &twice);
            let text = serde_json::to_string(&once.components[0].config).unwrap();
            prop_assert!(!text.contains("${env:"), "text still contains ${{env: token");
            prop_assert!(!text.contains("${envIs:"), "text still contains ${{envIs: token");
        }
    }
}
