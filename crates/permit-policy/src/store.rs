//! TOML-backed policy store.
//!
//! A `PolicyConfig` is deserialized from TOML and holds every policy for
//! every (flow type, action key). Field names follow the stored JSON shape,
//! so policy files use camelCase keys.
//!
//! ```toml
//! [[policies]]
//! id = "invoice-approve-finance"
//! flowType = "invoice"
//! actionKey = "approve"
//! priority = 10
//! requireReason = false
//! createdAt = "2026-01-05T09:00:00Z"
//! subjects = { roles = ["finance"] }
//! stateConstraints = { statusIn = ["pending"] }
//! guards = [{ type = "approval_open" }, { type = "chat_ack_completed" }]
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use permit_contracts::{
    error::{PermitError, PermitResult},
    policy::Policy,
};
use permit_core::traits::PolicyStore;

/// The top-level structure deserialized from a TOML policy file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub policies: Vec<Policy>,
}

/// A `PolicyStore` over a policy file loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct TomlPolicyStore {
    config: PolicyConfig,
}

impl TomlPolicyStore {
    /// Parse `s` as TOML and build a store.
    ///
    /// Returns `PermitError::ConfigError` if the TOML is malformed, does not
    /// match `PolicyConfig`, or declares the same policy id twice.
    pub fn from_toml_str(s: &str) -> PermitResult<Self> {
        let config: PolicyConfig = toml::from_str(s).map_err(|e| PermitError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and parse it as a policy file.
    pub fn from_file(path: &Path) -> PermitResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| PermitError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_config(config: PolicyConfig) -> PermitResult<Self> {
        let mut seen = HashSet::new();
        for policy in &config.policies {
            if !seen.insert(policy.id.as_str()) {
                return Err(PermitError::ConfigError {
                    reason: format!("duplicate policy id '{}'", policy.id),
                });
            }
        }
        debug!(policy_count = config.policies.len(), "policy file loaded");
        Ok(Self { config })
    }

    pub fn policies(&self) -> &[Policy] {
        &self.config.policies
    }
}

impl PolicyStore for TomlPolicyStore {
    fn list_enabled(&self, flow_type: &str, action_key: &str) -> PermitResult<Vec<Policy>> {
        let mut policies: Vec<Policy> = self
            .config
            .policies
            .iter()
            .filter(|p| p.is_enabled && p.flow_type == flow_type && p.action_key == action_key)
            .cloned()
            .collect();
        crate::matcher::sort_for_scan(&mut policies);
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use permit_contracts::error::PermitError;
    use permit_core::traits::PolicyStore;

    use super::TomlPolicyStore;

    const POLICIES: &str = r#"
        [[policies]]
        id = "old"
        flowType = "invoice"
        actionKey = "approve"
        priority = 5
        createdAt = "2026-01-01T00:00:00Z"

        [[policies]]
        id = "new"
        flowType = "invoice"
        actionKey = "approve"
        priority = 5
        createdAt = "2026-03-01T00:00:00Z"
        guards = [{ type = "editable_days", days = 7 }]

        [[policies]]
        id = "disabled"
        flowType = "invoice"
        actionKey = "approve"
        priority = 99
        isEnabled = false

        [[policies]]
        id = "other-action"
        flowType = "invoice"
        actionKey = "reject"
    "#;

    #[test]
    fn test_list_enabled_filters_and_orders() {
        let store = TomlPolicyStore::from_toml_str(POLICIES).unwrap();
        let ids: Vec<String> = store
            .list_enabled("invoice", "approve")
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_guards_load_as_json() {
        let store = TomlPolicyStore::from_toml_str(POLICIES).unwrap();
        let new = store.policies().iter().find(|p| p.id == "new").unwrap();
        assert_eq!(new.guards[0]["type"], "editable_days");
        assert_eq!(new.guards[0]["days"], 7);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let toml = r#"
            [[policies]]
            id = "dup"
            flowType = "invoice"
            actionKey = "approve"

            [[policies]]
            id = "dup"
            flowType = "invoice"
            actionKey = "submit"
        "#;
        match TomlPolicyStore::from_toml_str(toml) {
            Err(PermitError::ConfigError { reason }) => assert!(reason.contains("dup")),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_toml_parse_error() {
        match TomlPolicyStore::from_toml_str("this is not valid toml ][[[") {
            Err(PermitError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse policy TOML"), "got: {reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = TomlPolicyStore::from_file(std::path::Path::new("/nonexistent/policies.toml"));
        assert!(matches!(result, Err(PermitError::ConfigError { .. })));
    }
}
