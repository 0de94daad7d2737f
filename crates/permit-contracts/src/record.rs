//! Audit records for gated decisions.
//!
//! Every decision the approval flow acts on produces exactly one
//! `DecisionRecord`. Guard overrides carry the justification text so the
//! audit trail shows why a failing guard was bypassed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{decision::FallbackDecision, instance::InstanceStatus, request::TargetRef};

/// An immutable record of one gated action, written to the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub flow_type: String,
    pub action_key: String,
    pub actor_id: String,
    pub target: Option<TargetRef>,
    /// The decision exactly as the gate returned it.
    pub outcome: FallbackDecision,
    pub reason_text: Option<String>,
    /// Instance status after the action was applied (absent on denial of a
    /// submission, where no instance exists).
    pub instance_status: Option<InstanceStatus>,
    pub timestamp: DateTime<Utc>,
}
