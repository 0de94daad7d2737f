//! Approval instance types.
//!
//! An `ApprovalInstance` is the persisted ladder for one submitted document.
//! The instance service owns it; the engine only gates its transitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    approval::{ApprovalStep, Approver, StagePolicy},
    request::TargetRef,
};

/// Unique identifier for an approval instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub uuid::Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of an approval instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-changing action on a pending instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    Cancel,
}

impl ApprovalAction {
    /// The action key policies are configured under.
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
        }
    }
}

/// One recorded action against an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageAction {
    pub user_id: String,
    pub step_order: u32,
    pub action: ApprovalAction,
    /// The approver entry this action satisfied, for approvals.
    pub approver: Option<Approver>,
    /// Index into `ApprovalInstance::steps` of the satisfied entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    pub at: DateTime<Utc>,
}

/// The ladder and progress of one submitted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalInstance {
    pub id: InstanceId,
    pub flow_type: String,
    pub target: TargetRef,
    pub steps: Vec<ApprovalStep>,
    pub stage_policy: StagePolicy,
    /// Order of the stage currently awaiting approval.
    pub current_step: u32,
    pub status: InstanceStatus,
    pub actions: Vec<StageAction>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ApprovalInstance {
    /// Steps at the given stage order, in ladder order.
    pub fn steps_at(&self, order: u32) -> impl Iterator<Item = &ApprovalStep> {
        self.steps.iter().filter(move |s| s.step_order == order)
    }

    /// Indices into `steps` of the entries already satisfied at the given
    /// stage, in approval order.
    pub fn satisfied_indices(&self, order: u32) -> Vec<usize> {
        self.actions
            .iter()
            .filter(|a| a.step_order == order && a.action == ApprovalAction::Approve)
            .filter_map(|a| a.step_index)
            .filter(|i| self.steps.get(*i).is_some_and(|s| s.step_order == order))
            .collect()
    }

    /// Approver entries already satisfied at the given stage.
    pub fn satisfied_at(&self, order: u32) -> Vec<&Approver> {
        self.satisfied_indices(order)
            .into_iter()
            .filter_map(|i| self.steps.get(i))
            .map(|s| &s.approver)
            .collect()
    }

    /// The smallest stage order greater than `order`, if any.
    pub fn next_order_after(&self, order: u32) -> Option<u32> {
        self.steps
            .iter()
            .map(|s| s.step_order)
            .filter(|o| *o > order)
            .min()
    }
}
