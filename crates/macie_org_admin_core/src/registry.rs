//! Bookkeeping for declarations that must happen once.
//!
//! Some resources are shared by every construct that uses the same provider,
//! such as the handler's log group. Constructs ask the registry before
//! declaring them instead of keeping hidden static flags.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Each deployment unit declares its own copy.
    #[default]
    DeploymentUnit,
    /// Only the first deployment unit in the process declares it.
    Process,
}

#[derive(Debug, Clone, Default)]
pub struct DeclarationRegistry {
    scope: DedupScope,
    claimed: BTreeSet<(String, String)>,
}

impl DeclarationRegistry {
    pub fn new(scope: DedupScope) -> Self {
        Self {
            scope,
            claimed: BTreeSet::new(),
        }
    }

    /// Returns `true` exactly once per (unit, key) under the registry's scope.
    pub fn claim(&mut self, unit: &str, key: &str) -> bool {
        let entry = self.entry(unit, key);
        self.claimed.insert(entry)
    }

    pub fn is_declared(&self, unit: &str, key: &str) -> bool {
        self.claimed.contains(&self.entry(unit, key))
    }

    fn entry(&self, unit: &str, key: &str) -> (String, String) {
        match self.scope {
            DedupScope::DeploymentUnit => (unit.to_string(), key.to_string()),
            DedupScope::Process => (String::new(), key.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployment_unit_scope_claims_once_per_unit() {
        let mut registry = DeclarationRegistry::new(DedupScope::DeploymentUnit);

        assert!(registry.claim("stack-a", "log-group"));
        assert!(!registry.claim("stack-a", "log-group"));
        assert!(registry.claim("stack-b", "log-group"));
        assert!(registry.is_declared("stack-b", "log-group"));
        assert!(!registry.is_declared("stack-c", "log-group"));
    }

    #[test]
    fn process_scope_claims_once_overall() {
        let mut registry = DeclarationRegistry::new(DedupScope::Process);

        assert!(registry.claim("stack-a", "log-group"));
        assert!(!registry.claim("stack-b", "log-group"));
        assert!(registry.is_declared("stack-c", "log-group"));
        assert!(registry.claim("stack-b", "other"));
    }
}
