//! Engine settings.
//!
//! Every field has a default so a settings file only needs the values it
//! changes. Loading from TOML lives in `permit-policy`.

use serde::{Deserialize, Serialize};

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermitConfig {
    pub engine: EngineSettings,
    pub ladder: LadderSettings,
}

/// Settings for policy evaluation and the fallback adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Roles allowed to override acknowledgement guards with a justification.
    pub elevated_roles: Vec<String>,
    /// Target tables that can carry acknowledgement links.
    pub ack_target_tables: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            elevated_roles: vec!["admin".to_string()],
            ack_target_tables: [
                "approval_instances",
                "invoices",
                "estimates",
                "expenses",
                "leave_requests",
                "time_entries",
                "purchase_orders",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
        }
    }
}

/// Settings for the default approval ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderSettings {
    pub mgmt_group_id: String,
    pub exec_group_id: String,
    /// Used when a rule condition has no `skipUnder`.
    pub skip_under: f64,
    /// Used when a rule condition has no `execThreshold`.
    pub exec_threshold: f64,
}

impl Default for LadderSettings {
    fn default() -> Self {
        Self {
            mgmt_group_id: "mgmt".to_string(),
            exec_group_id: "exec".to_string(),
            skip_under: 50_000.0,
            exec_threshold: 100_000.0,
        }
    }
}
