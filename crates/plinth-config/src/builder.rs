//! # ConfigBuilder: Precedence Engine
//!
//! One algorithm shared by every component type. For a component it
//! assembles six layers, lowest precedence first:
//!
//! | # | Layer | Source |
//! |---|---|---|
//! | 1 | `HardcodedFallback` | [`ComponentDefaults::fallback`] |
//! | 2 | `ComplianceFrameworkDefault` | [`ComplianceTable`] entry for the framework and type |
//! | 3 | `PlatformDefault` | standard tags and naming conventions |
//! | 4 | `EnvironmentDefault` | environment defaults matching the type's top-level properties, then `defaults[<type>]` |
//! | 5 | `ComponentOverride` | the component's `config` |
//! | 6 | `PolicyOverride` | layer-2 values at every pointer `x-locked-by` the framework |
//!
//! and folds them left to right with [`deep_merge`]. Because layer 6 is
//! folded last, a component author can never weaken a locked control:
//! under `fedramp-high`, `storage.encrypted: false` in `config` resolves
//! to `true`, and the overturn is recorded as a [`PolicyEnforcement`].
//!
//! ## Validation
//!
//! Layers 4 and 5 come from the manifest author and are checked against
//! the type's override schema first ([`BuildError::InvalidLayer`]). The
//! folded output is checked against the full schema; failure there is a
//! builder defect ([`BuilderInternalError::SchemaInvalidOutput`]).
//!
//! ## Startup Checks
//!
//! [`ConfigBuilder::new`] refuses to construct over inconsistent catalog
//! data: every registered type needs a fallback provider whose baseline
//! satisfies the full schema, every compliance entry must satisfy the
//! override schema, and every locked pointer needs a mandated value.

use std::collections::BTreeMap;
use std::sync::Arc;

use plinth_core::value::{deep_merge, leaf_pointers, set_pointer};
use plinth_core::{sha256_digest, CanonicalBytes, ComplianceFramework, ComponentSpec};
use plinth_schema::{CatalogError, ComponentType, SchemaValidationError, SchemaValidator};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::compliance::ComplianceTable;
use crate::components::{builtin_defaults, ComponentDefaults};
use crate::context::BuildContext;
use crate::error::{BuildError, BuilderInternalError};
use crate::layers::ConfigLayer;
use crate::platform::platform_defaults;
use crate::resolved::{PolicyEnforcement, ResolvedConfig};

/// The precedence engine. Immutable after construction; share behind an
/// `Arc` to build components in parallel.
pub struct ConfigBuilder {
    validator: Arc<SchemaValidator>,
    compliance: ComplianceTable,
    defaults: BTreeMap<&'static str, Box<dyn ComponentDefaults>>,
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("validator", &self.validator)
            .field("providers", &self.defaults.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConfigBuilder {
    /// Builder over the built-in compliance table and type defaults.
    pub fn new(validator: Arc<SchemaValidator>) -> Result<Self, CatalogError> {
        Self::with_parts(validator, ComplianceTable::builtin()?, builtin_defaults())
    }

    /// Builder over explicit catalog data.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Inconsistent`] if the data fails any
    /// startup check.
    pub fn with_parts(
        validator: Arc<SchemaValidator>,
        compliance: ComplianceTable,
        providers: Vec<Box<dyn ComponentDefaults>>,
    ) -> Result<Self, CatalogError> {
        let defaults = providers
            .into_iter()
            .map(|p| (p.component_type(), p))
            .collect();
        let builder = Self {
            validator,
            compliance,
            defaults,
        };
        builder.check_catalog()?;
        debug!(types = builder.defaults.len(), "config builder ready");
        Ok(builder)
    }

    /// The schema validator the builder checks layers against.
    pub fn validator(&self) -> &Arc<SchemaValidator> {
        &self.validator
    }

    fn check_catalog(&self) -> Result<(), CatalogError> {
        for ty in self.validator.component_types().iter() {
            let inconsistent = |reason: String| CatalogError::Inconsistent {
                what: format!("component type '{}'", ty.name()),
                reason,
            };
            let provider = self
                .defaults
                .get(ty.name())
                .ok_or_else(|| inconsistent("no fallback provider".to_string()))?;
            self.validator
                .validate_component_config(ty.name(), &provider.fallback())
                .map_err(|e| inconsistent(format!("fallback is invalid: {e}")))?;

            for &framework in ComplianceFramework::all() {
                self.validator
                    .validate_component_override(ty.name(), &self.compliance.defaults(framework, ty.name()))
                    .map_err(|e| inconsistent(format!("{framework} defaults are invalid: {e}")))?;
                for pointer in ty.locked_pointers(framework) {
                    if self.compliance.mandated_value(framework, ty.name(), pointer).is_none() {
                        return Err(inconsistent(format!(
                            "{framework} locks {pointer} but the compliance table mandates no value"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve the configuration of one component.
    ///
    /// # Errors
    ///
    /// [`BuildError::UnknownComponentType`] or [`BuildError::InvalidLayer`]
    /// for manifest problems; [`BuildError::Internal`] for builder defects.
    pub fn build(&self, ctx: &BuildContext, spec: &ComponentSpec) -> Result<ResolvedConfig, BuildError> {
        let component = spec.name.as_str();
        let ty = self
            .validator
            .component_types()
            .get(&spec.component_type)
            .ok_or_else(|| BuildError::UnknownComponentType {
                component: component.to_string(),
                component_type: spec.component_type.clone(),
            })?;
        let provider = self
            .defaults
            .get(ty.name())
            .ok_or_else(|| BuilderInternalError::MissingProvider(ty.name().to_string()))?;
        let framework = ctx.compliance_framework;

        let environment = environment_layer(ctx, ty);
        self.check_user_layer(spec, ConfigLayer::EnvironmentDefault, &environment)?;
        self.check_user_layer(spec, ConfigLayer::ComponentOverride, &spec.config)?;

        let policy = self.policy_layer(framework, ty)?;
        let mut layers = vec![
            (ConfigLayer::HardcodedFallback, provider.fallback()),
            (
                ConfigLayer::ComplianceFrameworkDefault,
                self.compliance.defaults(framework, ty.name()),
            ),
            (
                ConfigLayer::PlatformDefault,
                platform_defaults(ctx, spec, ty, provider.as_ref()),
            ),
            (ConfigLayer::EnvironmentDefault, environment),
            (ConfigLayer::ComponentOverride, spec.config.clone()),
        ];

        let mut config = Value::Object(Map::new());
        for (_, tree) in &layers {
            deep_merge(&mut config, tree);
        }
        let enforcements = enforcements(component, &config, &policy, &layers);
        deep_merge(&mut config, &policy);
        layers.push((ConfigLayer::PolicyOverride, policy));

        let provenance = provenance(&config, &layers);

        self.validator
            .validate_component_config(ty.name(), &config)
            .map_err(|e| match e {
                SchemaValidationError::ValidationFailed { violations, .. } => {
                    BuilderInternalError::SchemaInvalidOutput {
                        component: component.to_string(),
                        component_type: ty.name().to_string(),
                        violations,
                    }
                }
                other => BuilderInternalError::Validator(other.to_string()),
            })?;

        let digest = sha256_digest(&CanonicalBytes::new(&config).map_err(BuilderInternalError::from)?);
        debug!(
            component,
            component_type = ty.name(),
            environment = %ctx.environment,
            framework = %framework,
            enforcements = enforcements.len(),
            digest = %digest,
            "resolved component configuration"
        );

        Ok(ResolvedConfig {
            component: spec.name.clone(),
            component_type: ty.name().to_string(),
            compliance_framework: framework,
            environment: ctx.environment.clone(),
            config,
            provenance,
            enforcements,
            digest,
        })
    }

    fn check_user_layer(&self, spec: &ComponentSpec, layer: ConfigLayer, tree: &Value) -> Result<(), BuildError> {
        match self.validator.validate_component_override(&spec.component_type, tree) {
            Ok(()) => Ok(()),
            Err(SchemaValidationError::ValidationFailed { violations, .. }) => Err(BuildError::InvalidLayer {
                component: spec.name.to_string(),
                layer,
                violations,
            }),
            Err(SchemaValidationError::UnknownComponentType(component_type)) => {
                Err(BuildError::UnknownComponentType {
                    component: spec.name.to_string(),
                    component_type,
                })
            }
        }
    }

    fn policy_layer(&self, framework: ComplianceFramework, ty: &ComponentType) -> Result<Value, BuilderInternalError> {
        let mut layer = Value::Object(Map::new());
        for pointer in ty.locked_pointers(framework) {
            let mandated = self
                .compliance
                .mandated_value(framework, ty.name(), pointer)
                .ok_or_else(|| BuilderInternalError::MissingMandate {
                    framework: framework.to_string(),
                    component_type: ty.name().to_string(),
                    pointer: pointer.to_string(),
                })?;
            set_pointer(&mut layer, pointer, mandated.clone());
        }
        Ok(layer)
    }
}

/// Layer 4: environment defaults whose keys are top-level properties of
/// the type, overlaid with the `defaults[<type>]` object if present.
fn environment_layer(ctx: &BuildContext, ty: &ComponentType) -> Value {
    let properties = ty.top_level_properties();
    let mut layer = Value::Object(
        ctx.environment_defaults
            .iter()
            .filter(|(key, _)| properties.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    );
    if let Some(typed) = ctx.environment_defaults.get(ty.name()).filter(|v| v.is_object()) {
        deep_merge(&mut layer, typed);
    }
    layer
}

/// Locked leaves where the folded lower layers disagree with the mandate.
fn enforcements(
    component: &str,
    folded: &Value,
    policy: &Value,
    lower_layers: &[(ConfigLayer, Value)],
) -> Vec<PolicyEnforcement> {
    let mut out = Vec::new();
    for pointer in leaf_pointers(policy) {
        let (Some(attempted), Some(enforced)) = (folded.pointer(&pointer), policy.pointer(&pointer)) else {
            continue;
        };
        if attempted == enforced {
            continue;
        }
        let attempted_by = highest_layer_containing(&pointer, lower_layers).unwrap_or(ConfigLayer::HardcodedFallback);
        warn!(
            component,
            pointer = %pointer,
            attempted = %attempted,
            enforced = %enforced,
            layer = %attempted_by,
            "policy re-asserted a mandated value"
        );
        out.push(PolicyEnforcement {
            pointer,
            attempted: attempted.clone(),
            attempted_by,
            enforced: enforced.clone(),
        });
    }
    out
}

/// Map every leaf of `config` to the highest layer whose tree holds it.
fn provenance(config: &Value, layers: &[(ConfigLayer, Value)]) -> BTreeMap<String, ConfigLayer> {
    leaf_pointers(config)
        .into_iter()
        .filter_map(|pointer| {
            let layer = highest_layer_containing(&pointer, layers)?;
            Some((pointer, layer))
        })
        .collect()
}

fn highest_layer_containing(pointer: &str, layers: &[(ConfigLayer, Value)]) -> Option<ConfigLayer> {
    layers
        .iter()
        .rev()
        .find(|(_, tree)| tree.pointer(pointer).is_some())
        .map(|(layer, _)| *layer)
}
