//! Decision types produced by the policy matcher and fallback adapter.
//!
//! A `Decision` is ephemeral: it lives for one evaluation call and is then
//! either acted upon or written to the audit trail by the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::guard::GuardFailure;

/// Why an action was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No enabled policy matched the actor and state. Callers that have not
    /// adopted explicit policies treat this as permissive.
    NoMatchingPolicy,
    /// At least one policy matched but every matching policy had a failing
    /// guard.
    GuardFailed,
    /// The matched policy requires a justification and none was given.
    ReasonRequired,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatchingPolicy => "no_matching_policy",
            Self::GuardFailed => "guard_failed",
            Self::ReasonRequired => "reason_required",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of evaluating one action against the configured policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,

    /// Present only on denials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,

    #[serde(default)]
    pub matched_policy_id: Option<String>,

    #[serde(default)]
    pub require_reason: bool,

    #[serde(default)]
    pub guard_failures: Vec<GuardFailure>,

    /// Set when a privileged actor bypassed failing guards with a
    /// justification. The caller must audit the override.
    #[serde(default)]
    pub guard_override: bool,
}

impl Decision {
    pub fn allow(policy_id: impl Into<String>, require_reason: bool) -> Self {
        Self {
            allowed: true,
            reason: None,
            matched_policy_id: Some(policy_id.into()),
            require_reason,
            guard_failures: Vec::new(),
            guard_override: false,
        }
    }

    pub fn no_matching_policy() -> Self {
        Self {
            allowed: false,
            reason: Some(DenyReason::NoMatchingPolicy),
            matched_policy_id: None,
            require_reason: false,
            guard_failures: Vec::new(),
            guard_override: false,
        }
    }

    pub fn guard_failed(policy_id: impl Into<String>, failures: Vec<GuardFailure>) -> Self {
        Self {
            allowed: false,
            reason: Some(DenyReason::GuardFailed),
            matched_policy_id: Some(policy_id.into()),
            require_reason: false,
            guard_failures: failures,
            guard_override: false,
        }
    }

    pub fn reason_required(policy_id: Option<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(DenyReason::ReasonRequired),
            matched_policy_id: policy_id,
            require_reason: true,
            guard_failures: Vec::new(),
            guard_override: false,
        }
    }

    pub fn is_denied_for(&self, reason: DenyReason) -> bool {
        !self.allowed && self.reason == Some(reason)
    }
}

/// A `Decision` as seen by callers that may not have migrated to explicit
/// policies yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackDecision {
    #[serde(flatten)]
    pub decision: Decision,

    /// False when the permissive legacy path was taken because nothing was
    /// configured for the action.
    pub policy_applied: bool,
}

impl FallbackDecision {
    pub fn allowed(&self) -> bool {
        self.decision.allowed
    }
}
