//! Core trait definitions for the PERMIT engine.
//!
//! Three groups of traits define the boundary between the engine and its
//! host:
//!
//! - Read stores (`PolicyStore`, `ApprovalInstanceStore`, `ProjectStore`,
//!   `PeriodLockStore`, `WorklogSettingStore`, `AckLinkStore`,
//!   `AckRequestStore`, `AckStore`) and `Clock`: state owned elsewhere that
//!   the engine reads.
//! - Gates (`PolicyEvaluator`, `ActionGate`): what the engine exposes.
//! - `AuditWriter`: where gated decisions are recorded.
//!
//! All calls are synchronous. Store implementations own their own timeouts
//! and retries and report exhaustion as `PermitError::StoreError`.

use chrono::{DateTime, Utc};

use permit_contracts::{
    decision::{Decision, FallbackDecision},
    error::PermitResult,
    external::{Ack, AckLink, AckRequest, OpenApproval, PeriodLock},
    policy::Policy,
    record::DecisionRecord,
    request::EvaluationInput,
};

/// Source of authorization policies.
pub trait PolicyStore: Send + Sync {
    /// Enabled policies for (`flow_type`, `action_key`), ordered by priority
    /// descending then creation time descending.
    fn list_enabled(&self, flow_type: &str, action_key: &str) -> PermitResult<Vec<Policy>>;
}

/// Lookup of approval instances still awaiting a decision.
pub trait ApprovalInstanceStore: Send + Sync {
    fn find_open(
        &self,
        flow_type: &str,
        target_table: &str,
        target_id: &str,
    ) -> PermitResult<Option<OpenApproval>>;
}

/// Project lifecycle lookup.
pub trait ProjectStore: Send + Sync {
    /// The subset of `project_ids` whose status is "closed".
    fn find_closed_among(&self, project_ids: &[String]) -> PermitResult<Vec<String>>;
}

/// Period lock lookup.
pub trait PeriodLockStore: Send + Sync {
    /// Active locks for any of `period_keys` that are either global or scoped
    /// to one of `project_ids`. Implementations should answer with a single
    /// query.
    fn find_active(&self, period_keys: &[String], project_ids: &[String]) -> PermitResult<Vec<PeriodLock>>;
}

/// Worklog settings.
pub trait WorklogSettingStore: Send + Sync {
    /// Size of the trailing edit window in days, or `None` when unlimited.
    fn editable_days(&self) -> PermitResult<Option<u32>>;
}

/// Links between documents and acknowledgement requests.
pub trait AckLinkStore: Send + Sync {
    fn find_by_target(&self, target_table: &str, target_id: &str) -> PermitResult<Vec<AckLink>>;
}

/// Acknowledgement requests.
pub trait AckRequestStore: Send + Sync {
    fn find_by_ids(&self, request_ids: &[String]) -> PermitResult<Vec<AckRequest>>;
}

/// Recipient acknowledgements.
pub trait AckStore: Send + Sync {
    /// Every ack recorded against any of `request_ids`.
    fn find_by_requests(&self, request_ids: &[String]) -> PermitResult<Vec<Ack>>;
}

/// Evaluation-time source. Read once per evaluation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Decides whether one action is permitted under the configured policies.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, input: &EvaluationInput) -> PermitResult<Decision>;
}

/// The gate approval flows call before every state-changing action.
///
/// Unlike `PolicyEvaluator`, this applies the legacy fallback rules, so an
/// action with no configured policy is allowed.
pub trait ActionGate: Send + Sync {
    fn evaluate_with_fallback(&self, input: &EvaluationInput) -> PermitResult<FallbackDecision>;
}

/// The audit writer: the immutable record of gated decisions.
///
/// A failed write is returned to the caller; an action that cannot be
/// audited is not applied.
pub trait AuditWriter: Send + Sync {
    /// Append one decision record. Records are never modified or deleted.
    fn write(&self, record: &DecisionRecord) -> PermitResult<()>;

    /// Seal the stream identified by `stream_id`.
    fn finalize(&self, stream_id: &str) -> PermitResult<()>;
}
