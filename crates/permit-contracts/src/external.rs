//! Read models returned by the external stores the guards consult.
//!
//! These rows are owned by other services (projects, worklogs, chat). The
//! engine only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::TargetRef;

/// A pending approval instance found for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApproval {
    pub id: String,
    pub flow_type: String,
    pub target: TargetRef,
}

/// The reach of a period lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum LockScope {
    Global,
    Project {
        #[serde(rename = "projectId")]
        project_id: String,
    },
}

/// An active administrative freeze on a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodLock {
    pub id: String,
    /// Month key, `YYYY-MM`.
    pub period_key: String,
    #[serde(flatten)]
    pub scope: LockScope,
}

impl PeriodLock {
    /// True if this lock freezes `period_key` for `project_id`. Global locks
    /// cover every project, including entries with no project.
    pub fn covers(&self, period_key: &str, project_id: Option<&str>) -> bool {
        if self.period_key != period_key {
            return false;
        }
        match &self.scope {
            LockScope::Global => true,
            LockScope::Project { project_id: locked } => project_id == Some(locked.as_str()),
        }
    }
}

/// Attaches an acknowledgement request to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckLink {
    pub request_id: String,
    pub target: TargetRef,
}

/// A chat message that named recipients must acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckRequest {
    pub id: String,
    pub message_id: String,
    pub required_user_ids: Vec<String>,
    #[serde(default)]
    pub canceled_at: Option<DateTime<Utc>>,
    /// Set when the source chat message has been deleted.
    #[serde(default)]
    pub message_deleted: bool,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

/// One recipient's confirmation of an ack request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub request_id: String,
    pub user_id: String,
    pub acked_at: DateTime<Utc>,
}
