//! Approval ladder types: steps, stage completion policy, and the rule
//! conditions used to pick a ladder at submission time.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::Actor;

/// Who may approve a step. Exactly one of a group or a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Approver {
    #[serde(rename = "approverGroupId")]
    Group(String),
    #[serde(rename = "approverUserId")]
    User(String),
}

impl Approver {
    pub fn group(id: impl Into<String>) -> Self {
        Self::Group(id.into())
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn group_id(&self) -> Option<&str> {
        match self {
            Self::Group(id) => Some(id),
            Self::User(_) => None,
        }
    }

    /// True if `actor` is this user or belongs to this group.
    pub fn admits(&self, actor: &Actor) -> bool {
        match self {
            Self::Group(id) => actor.in_group(id),
            Self::User(id) => *id == actor.user_id,
        }
    }
}

/// One rung of an approval ladder.
///
/// Serialized as `{"approverGroupId": "mgmt", "stepOrder": 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStep {
    #[serde(flatten)]
    pub approver: Approver,
    /// 1-based stage number. Steps sharing an order run in parallel.
    pub step_order: u32,
}

impl ApprovalStep {
    pub fn new(approver: Approver, step_order: u32) -> Self {
        Self { approver, step_order }
    }
}

/// How a stage completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CompletionMode {
    /// Every approver at the stage must approve.
    #[default]
    All,
    /// A single approval completes the stage.
    Any,
    /// At least `quorum` distinct approvers must approve.
    Quorum { quorum: u32 },
}

impl CompletionMode {
    /// True once `satisfied` of `total` approvers at a stage have approved.
    pub fn is_satisfied(&self, satisfied: usize, total: usize) -> bool {
        match *self {
            Self::All => satisfied >= total,
            Self::Any => satisfied >= 1,
            Self::Quorum { quorum } => satisfied >= quorum as usize,
        }
    }
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Any => f.write_str("any"),
            Self::Quorum { .. } => f.write_str("quorum"),
        }
    }
}

/// Completion mode per stage order. Orders without an entry complete in
/// `All` mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagePolicy(BTreeMap<u32, CompletionMode>);

impl StagePolicy {
    /// An `All` entry for every order in `orders`.
    pub fn all_for(orders: impl IntoIterator<Item = u32>) -> Self {
        Self(orders.into_iter().map(|o| (o, CompletionMode::All)).collect())
    }

    pub fn insert(&mut self, order: u32, mode: CompletionMode) {
        self.0.insert(order, mode);
    }

    pub fn mode_for(&self, order: u32) -> CompletionMode {
        self.0.get(&order).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &CompletionMode)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The uniform ladder shape both step-definition formats normalize into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedSteps {
    pub steps: Vec<ApprovalStep>,
    pub stage_policy: StagePolicy,
}

impl NormalizedSteps {
    /// Distinct stage orders, ascending.
    pub fn orders(&self) -> Vec<u32> {
        let mut orders: Vec<u32> = self.steps.iter().map(|s| s.step_order).collect();
        orders.sort_unstable();
        orders.dedup();
        orders
    }
}

/// Predicate over a submitted document payload used to select an approval
/// rule and to parameterize the default ladder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleCondition {
    /// Flow types this condition applies to. Empty means any.
    pub flow_types: Vec<String>,
    /// Inclusive lower bound on the document amount.
    pub min_amount: Option<f64>,
    /// Exclusive upper bound on the document amount.
    pub max_amount: Option<f64>,
    /// Amounts below this get a single management stage.
    pub skip_under: Option<f64>,
    /// Amounts at or above this add an executive stage.
    pub exec_threshold: Option<f64>,
    /// When set, the payload's recurring flag must equal this.
    pub is_recurring: Option<bool>,
}

/// An administrator-configured approval rule for one flow type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRule {
    pub id: String,
    pub flow_type: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub condition: RuleCondition,
    /// Raw step definition in either the flat or the staged shape.
    #[serde(default)]
    pub steps: serde_json::Value,
    #[serde(default = "epoch")]
    pub created_at: DateTime<Utc>,
}

/// Status label shown while an approval instance waits on a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    PendingQa,
    PendingExec,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingQa => "pending_qa",
            Self::PendingExec => "pending_exec",
        }
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_enabled() -> bool {
    true
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}
