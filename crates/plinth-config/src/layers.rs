//! # Precedence Layers
//!
//! The six named sources a resolved configuration is folded from, lowest
//! precedence first. The derive order of [`ConfigLayer`] is the
//! precedence order, so `a < b` means `b` wins a conflicting leaf.

use serde::{Deserialize, Serialize};

/// One named source of configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigLayer {
    /// Per-type baseline that is valid with zero other input.
    HardcodedFallback,
    /// Values raising security posture for the active framework.
    ComplianceFrameworkDefault,
    /// Platform conventions: standard tags and naming.
    PlatformDefault,
    /// Values from the manifest's defaults for the target environment.
    EnvironmentDefault,
    /// The author's `config` for this component.
    ComponentOverride,
    /// Mandated values at policy-locked paths. Always applied last.
    PolicyOverride,
}

impl ConfigLayer {
    /// All layers, lowest precedence first.
    pub fn all() -> &'static [ConfigLayer] {
        &[
            Self::HardcodedFallback,
            Self::ComplianceFrameworkDefault,
            Self::PlatformDefault,
            Self::EnvironmentDefault,
            Self::ComponentOverride,
            Self::PolicyOverride,
        ]
    }

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HardcodedFallback => "hardcoded-fallback",
            Self::ComplianceFrameworkDefault => "compliance-framework-default",
            Self::PlatformDefault => "platform-default",
            Self::EnvironmentDefault => "environment-default",
            Self::ComponentOverride => "component-override",
            Self::PolicyOverride => "policy-override",
        }
    }

    /// Returns true for layers sourced from the manifest author.
    pub fn is_user_supplied(&self) -> bool {
        matches!(self, Self::EnvironmentDefault | Self::ComponentOverride)
    }
}

impl std::fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_order_is_precedence_order() {
        let all = ConfigLayer::all();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(all.first(), Some(&ConfigLayer::HardcodedFallback));
        assert_eq!(all.last(), Some(&ConfigLayer::PolicyOverride));
    }

    #[test]
    fn serde_uses_wire_names() {
        for layer in ConfigLayer::all() {
            let json = serde_json::to_value(layer).unwrap();
            assert_eq!(json, layer.as_str());
        }
    }

    #[test]
    fn only_manifest_layers_are_user_supplied() {
        let user: Vec<_> = ConfigLayer::all().iter().filter(|l| l.is_user_supplied()).collect();
        assert_eq!(user, vec![&ConfigLayer::EnvironmentDefault, &ConfigLayer::ComponentOverride]);
    }
}
