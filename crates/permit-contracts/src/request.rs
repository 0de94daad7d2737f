//! Evaluation request types.
//!
//! An `EvaluationInput` is everything the policy matcher needs to decide one
//! action: who is acting, on what kind of document, in which state, and with
//! what justification.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The user attempting an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = roles.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_groups(mut self, group_ids: &[&str]) -> Self {
        self.group_ids = group_ids.iter().map(|g| g.to_string()).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn in_group(&self, group_id: &str) -> bool {
        self.group_ids.iter().any(|g| g == group_id)
    }
}

/// A reference to the row an action targets (e.g. `invoices` / `inv-42`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub table: String,
    pub id: String,
}

impl TargetRef {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }
}

/// Snapshot of the live entity the action applies to.
///
/// Every field is optional: single-value and list forms may both be present
/// and are merged by the guards that read them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityState {
    pub status: Option<String>,
    pub project_id: Option<String>,
    pub project_ids: Vec<String>,
    pub work_date: Option<NaiveDate>,
    pub work_dates: Vec<NaiveDate>,
    pub period_key: Option<String>,
    pub period_keys: Vec<String>,
}

impl EntityState {
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}

/// One policy evaluation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInput {
    pub flow_type: String,
    pub action_key: String,
    pub actor: Actor,
    #[serde(default)]
    pub state: EntityState,
    #[serde(default)]
    pub reason_text: Option<String>,
    #[serde(default)]
    pub target: Option<TargetRef>,
}

impl EvaluationInput {
    pub fn new(flow_type: impl Into<String>, action_key: impl Into<String>, actor: Actor) -> Self {
        Self {
            flow_type: flow_type.into(),
            action_key: action_key.into(),
            actor,
            state: EntityState::default(),
            reason_text: None,
            target: None,
        }
    }

    pub fn with_state(mut self, state: EntityState) -> Self {
        self.state = state;
        self
    }

    pub fn with_target(mut self, target: TargetRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason_text = Some(reason.into());
        self
    }

    /// True when a non-blank justification was supplied.
    pub fn has_reason(&self) -> bool {
        self.reason_text
            .as_deref()
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false)
    }
}
