//! # Reference Validation
//!
//! Resolves every binding of a hydrated manifest to a concrete target
//! component and checks that the target exposes the requested
//! capability. All problems are collected into one [`ReferenceError`];
//! on success the resolved [`BindingGraph`] is handed on to synthesis.
//!
//! A selector must match exactly one component. Ties are never broken:
//! two matches is an [`ReferenceErrorKind::AmbiguousSelector`] error.

use std::collections::{BTreeMap, BTreeSet};

use plinth_core::{AccessLevel, BindingTarget, ComponentName, ComponentSpec, ServiceManifest};
use plinth_schema::ComponentTypeRegistry;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Source of component-type capabilities.
pub trait CapabilityCatalog {
    /// Capabilities exposed by `component_type`, `None` if unregistered.
    fn capabilities(&self, component_type: &str) -> Option<&BTreeSet<String>>;
}

impl CapabilityCatalog for ComponentTypeRegistry {
    fn capabilities(&self, component_type: &str) -> Option<&BTreeSet<String>> {
        self.get(component_type).map(|ty| ty.capabilities())
    }
}

impl CapabilityCatalog for BTreeMap<String, BTreeSet<String>> {
    fn capabilities(&self, component_type: &str) -> Option<&BTreeSet<String>> {
        self.get(component_type)
    }
}

/// What is wrong with one reference.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ReferenceErrorKind {
    /// Two components share a name.
    #[error("component name '{name}' is declared more than once")]
    DuplicateComponent {
        /// The repeated name.
        name: String,
    },

    /// A component declares a type with no registered schema.
    #[error("component type '{component_type}' is not registered")]
    UnknownComponentType {
        /// The unregistered type.
        #[serde(rename = "type")]
        component_type: String,
    },

    /// `to` names a component that does not exist.
    #[error("binding target '{target}' does not exist")]
    UnknownTarget {
        /// The missing component name.
        target: String,
    },

    /// No component satisfies a selector.
    #[error("no component satisfies selector {selector}")]
    NoSelectorMatch {
        /// Rendered selector.
        selector: String,
    },

    /// More than one component satisfies a selector.
    #[error("ambiguous selector {selector}, {count} components match: {}", .matches.join(", "))]
    AmbiguousSelector {
        /// Rendered selector.
        selector: String,
        /// Number of matches.
        count: usize,
        /// Names of the matching components.
        matches: Vec<String>,
    },

    /// A binding resolves to the component declaring it.
    #[error("binding resolves to its own component")]
    SelfBinding,

    /// The target exists but does not expose the capability.
    #[error(
        "target '{target}' ({target_type}) does not provide capability '{capability}'; available: {}",
        .available.join(", ")
    )]
    CapabilityMismatch {
        /// Resolved target component.
        target: String,
        /// Its type.
        target_type: String,
        /// Requested capability.
        capability: String,
        /// What the target type does provide.
        available: Vec<String>,
    },
}

/// One unresolved reference, located in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedReference {
    /// JSON pointer to the offending component or binding.
    pub path: String,
    /// Component whose declaration is at fault.
    pub component: String,
    /// What is wrong.
    #[serde(flatten)]
    pub kind: ReferenceErrorKind,
}

impl std::fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.path, self.kind)
    }
}

/// Every unresolved reference in a manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{} unresolved reference(s):\n{}", .unresolved.len(), render(.unresolved))]
pub struct ReferenceError {
    /// Problems in declaration order.
    pub unresolved: Vec<UnresolvedReference>,
}

fn render(unresolved: &[UnresolvedReference]) -> String {
    unresolved
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A resolved binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingEdge {
    /// Component declaring the binding.
    pub source: ComponentName,
    /// Concrete target component.
    pub target: ComponentName,
    /// Target's type.
    pub target_type: String,
    /// Capability consumed.
    pub capability: String,
    /// Requested access.
    pub access: AccessLevel,
    /// Environment variable names to inject.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Opaque options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    /// True if the target was found through a selector.
    pub via_selector: bool,
}

/// Resolved bindings of a manifest, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BindingGraph {
    edges: Vec<BindingEdge>,
}

impl BindingGraph {
    /// All edges.
    pub fn edges(&self) -> &[BindingEdge] {
        &self.edges
    }

    /// Edges declared by `component`.
    pub fn outgoing<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a BindingEdge> {
        self.edges.iter().filter(move |e| e.source.as_str() == component)
    }

    /// Edges targeting `component`.
    pub fn incoming<'a>(&'a self, component: &'a str) -> impl Iterator<Item = &'a BindingEdge> {
        self.edges.iter().filter(move |e| e.target.as_str() == component)
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Returns true if the manifest declares no bindings.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Resolve every binding in `manifest` against `catalog`.
///
/// # Errors
///
/// Returns a [`ReferenceError`] listing every duplicate name, unknown
/// type, unresolved target, ambiguous selector, self-binding and
/// capability mismatch found.
pub fn validate_references(
    manifest: &ServiceManifest,
    catalog: &impl CapabilityCatalog,
) -> Result<BindingGraph, ReferenceError> {
    let mut unresolved = Vec::new();
    let mut by_name: BTreeMap<&str, &ComponentSpec> = BTreeMap::new();

    for (i, component) in manifest.components.iter().enumerate() {
        let name = component.name.as_str();
        if by_name.contains_key(name) {
            unresolved.push(UnresolvedReference {
                path: format!("/components/{i}/name"),
                component: name.to_string(),
                kind: ReferenceErrorKind::DuplicateComponent { name: name.to_string() },
            });
        } else {
            by_name.insert(name, component);
        }
        if catalog.capabilities(&component.component_type).is_none() {
            unresolved.push(UnresolvedReference {
                path: format!("/components/{i}/type"),
                component: name.to_string(),
                kind: ReferenceErrorKind::UnknownComponentType {
                    component_type: component.component_type.clone(),
                },
            });
        }
    }

    let mut edges = Vec::new();
    for (i, component) in manifest.components.iter().enumerate() {
        for (j, binding) in component.binds.iter().enumerate() {
            let path = format!("/components/{i}/binds/{j}");
            let problem = |kind| UnresolvedReference {
                path: path.clone(),
                component: component.name.to_string(),
                kind,
            };

            let target = match &binding.target {
                BindingTarget::Direct(name) => match by_name.get(name.as_str()) {
                    Some(target) => *target,
                    None => {
                        unresolved.push(problem(ReferenceErrorKind::UnknownTarget {
                            target: name.to_string(),
                        }));
                        continue;
                    }
                },
                BindingTarget::Selector(selector) => {
                    let matches: Vec<&ComponentSpec> =
                        manifest.components.iter().filter(|c| selector.matches(c)).collect();
                    match matches.as_slice() {
                        [only] => *only,
                        [] => {
                            unresolved.push(problem(ReferenceErrorKind::NoSelectorMatch {
                                selector: selector.to_string(),
                            }));
                            continue;
                        }
                        many => {
                            unresolved.push(problem(ReferenceErrorKind::AmbiguousSelector {
                                selector: selector.to_string(),
                                count: many.len(),
                                matches: many.iter().map(|c| c.name.to_string()).collect(),
                            }));
                            continue;
                        }
                    }
                }
            };

            if target.name == component.name {
                unresolved.push(problem(ReferenceErrorKind::SelfBinding));
                continue;
            }

            // An unregistered target type was already reported above.
            let Some(available) = catalog.capabilities(&target.component_type) else {
                continue;
            };
            if !available.contains(&binding.capability) {
                unresolved.push(problem(ReferenceErrorKind::CapabilityMismatch {
                    target: target.name.to_string(),
                    target_type: target.component_type.clone(),
                    capability: binding.capability.clone(),
                    available: available.iter().cloned().collect(),
                }));
                continue;
            }

            edges.push(BindingEdge {
                source: component.name.clone(),
                target: target.name.clone(),
                target_type: target.component_type.clone(),
                capability: binding.capability.clone(),
                access: binding.access,
                env: binding.env.clone(),
                options: binding.options.clone(),
                via_selector: matches!(binding.target, BindingTarget::Selector(_)),
            });
        }
    }

    if unresolved.is_empty() {
        debug!(service = %manifest.service, bindings = edges.len(), "references resolved");
        Ok(BindingGraph { edges })
    } else {
        debug!(service = %manifest.service, unresolved = unresolved.len(), "reference validation failed");
        Err(ReferenceError { unresolved })
    }
}
