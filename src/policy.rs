//! Parse-time configuration for [`DocumentBuilder`](crate::DocumentBuilder).

use crate::error::BuildCause;
use serde::{Deserialize, Serialize};

/// How a document is parsed. Fixed when the builder is created and applied
/// once per build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsePolicy {
    /// Check the document against its DTD.
    pub validate: bool,
    /// Bound entity expansion and refuse unresolved external fetches.
    pub security_hardened: bool,
    pub namespace_aware: bool,
    pub ignore_comments: bool,
    pub expand_entity_references: bool,
    pub limits: SecurityLimits,
    pub diagnostics: ErrorHandling,
}

impl Default for ParsePolicy {
    fn default() -> Self {
        Self {
            validate: false,
            security_hardened: true,
            namespace_aware: false,
            ignore_comments: true,
            expand_entity_references: true,
            limits: SecurityLimits::default(),
            diagnostics: ErrorHandling::default(),
        }
    }
}

impl ParsePolicy {
    /// A default policy with validation switched on or off.
    pub fn validating(validate: bool) -> Self {
        Self {
            validate,
            ..Self::default()
        }
    }

    /// Rejects settings the builder cannot honour.
    pub fn check_supported(&self) -> Result<(), BuildCause> {
        if self.namespace_aware {
            return Err(BuildCause::UnsupportedPolicy(
                "namespace-aware parsing is not available".to_string(),
            ));
        }
        if !self.security_hardened {
            return Err(BuildCause::UnsupportedPolicy(
                "secure processing cannot be switched off".to_string(),
            ));
        }
        if !self.expand_entity_references {
            return Err(BuildCause::UnsupportedPolicy(
                "entity references are always expanded".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounds applied while entities are expanded and the tree is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityLimits {
    /// Entity references a single entity may expand to, transitively.
    pub entity_expansion_limit: u64,
    /// Bytes of replacement text entity references may produce across the
    /// whole document. A declaration that alone expands past it is rejected
    /// before the tree is built.
    pub total_entity_size_limit: u64,
    pub max_nodes: u32,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            entity_expansion_limit: 64_000,
            total_entity_size_limit: 50_000_000,
            max_nodes: u32::MAX,
        }
    }
}

/// What to do with a parser report of a given severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Escalate,
    Ignore,
}

/// Reactions for warnings, recoverable errors and fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandling {
    pub on_warning: Reaction,
    pub on_error: Reaction,
    /// A fatal error always ends the build; `Ignore` only logs it first.
    pub on_fatal_error: Reaction,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            on_warning: Reaction::Ignore,
            on_error: Reaction::Escalate,
            on_fatal_error: Reaction::Escalate,
        }
    }
}
