//! Authorization policy records.
//!
//! Policies are authored by administrators and read by the engine. For a
//! given (flow type, action key) they are scanned by descending priority,
//! newest first among equal priorities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::Actor;

/// Who a policy applies to. Clauses are OR-ed; an empty clause set matches
/// every actor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subjects {
    pub roles: Vec<String>,
    pub group_ids: Vec<String>,
    pub user_ids: Vec<String>,
}

impl Subjects {
    pub fn is_wildcard(&self) -> bool {
        self.roles.is_empty() && self.group_ids.is_empty() && self.user_ids.is_empty()
    }
}

/// Document-status filters a policy requires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateConstraints {
    /// When non-empty, the document status must be one of these.
    pub status_in: Vec<String>,
    /// The document status must not be any of these.
    pub status_not_in: Vec<String>,
}

/// A single authorization policy for one (flow type, action key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Stable identifier reported in decisions and audit records.
    pub id: String,

    pub flow_type: String,

    pub action_key: String,

    /// Higher values are evaluated first.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_enabled")]
    pub is_enabled: bool,

    #[serde(default)]
    pub subjects: Subjects,

    #[serde(default)]
    pub state_constraints: StateConstraints,

    /// Raw guard list as stored. Kept untyped so that malformed
    /// configuration surfaces as a guard failure instead of a load error.
    #[serde(default)]
    pub guards: serde_json::Value,

    #[serde(default)]
    pub require_reason: bool,

    /// Tie-breaker among equal priorities (newest first).
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

impl Policy {
    /// True if `actor` satisfies at least one subject clause, or if the
    /// policy declares no subjects at all.
    pub fn applies_to(&self, actor: &Actor) -> bool {
        if self.subjects.is_wildcard() {
            return true;
        }
        self.subjects.roles.iter().any(|r| actor.has_role(r))
            || self.subjects.group_ids.iter().any(|g| actor.in_group(g))
            || self.subjects.user_ids.iter().any(|u| *u == actor.user_id)
    }

    /// True if `status` passes both `status_in` and `status_not_in`.
    pub fn admits_status(&self, status: Option<&str>) -> bool {
        let constraints = &self.state_constraints;
        if !constraints.status_in.is_empty() {
            match status {
                Some(s) if constraints.status_in.iter().any(|c| c == s) => {}
                _ => return false,
            }
        }
        match status {
            Some(s) => !constraints.status_not_in.iter().any(|c| c == s),
            None => true,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}
