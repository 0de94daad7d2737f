//! Guard evaluator for the PERMIT engine.
//!
//! `GuardEvaluator` checks the guard list of one matched policy. Evaluation
//! runs in two phases per entry:
//!
//! 1. **Structural**: the entry is validated against a JSON Schema compiled
//!    once at construction. Invalid entries become `invalid_item` failures
//!    and the remaining entries are still checked.
//! 2. **Semantic**: the entry's `GuardKind` is matched exhaustively and the
//!    relevant stores are consulted.
//!
//! All failures are collected before returning so a denied caller sees the
//! full failure set in one pass. Failing guards are business outcomes and
//! are returned as data; only store errors propagate as `Err`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};

use permit_contracts::{
    config::EngineSettings,
    error::{PermitError, PermitResult},
    external::{AckRequest, LockScope},
    guard::{GuardFailure, GuardFailureReason, GuardKind, GuardSpec},
    request::EvaluationInput,
};
use permit_core::traits::{
    AckLinkStore, AckRequestStore, AckStore, ApprovalInstanceStore, PeriodLockStore, ProjectStore,
    WorklogSettingStore,
};

use crate::extract;

/// Guard type reported for a malformed guard list or entry.
pub const SCHEMA_GUARD_TYPE: &str = "schema";

/// The read stores guards consult.
#[derive(Clone)]
pub struct GuardStores {
    pub approvals: Arc<dyn ApprovalInstanceStore>,
    pub projects: Arc<dyn ProjectStore>,
    pub period_locks: Arc<dyn PeriodLockStore>,
    pub worklog_settings: Arc<dyn WorklogSettingStore>,
    pub ack_links: Arc<dyn AckLinkStore>,
    pub ack_requests: Arc<dyn AckRequestStore>,
    pub acks: Arc<dyn AckStore>,
}

/// The PERMIT guard evaluator.
pub struct GuardEvaluator {
    stores: GuardStores,
    /// Tables whose rows can carry acknowledgement links.
    ack_target_tables: Vec<String>,
    item_validator: jsonschema::Validator,
}

impl GuardEvaluator {
    /// Build an evaluator over `stores`.
    ///
    /// # Errors
    ///
    /// Returns `PermitError::ConfigError` if the guard item schema fails to
    /// compile.
    pub fn new(stores: GuardStores, settings: &EngineSettings) -> PermitResult<Self> {
        let item_validator =
            jsonschema::validator_for(&guard_item_schema()).map_err(|e| PermitError::ConfigError {
                reason: format!("guard item schema failed to compile: {e}"),
            })?;

        Ok(Self {
            stores,
            ack_target_tables: settings.ack_target_tables.clone(),
            item_validator,
        })
    }

    /// Evaluate the raw `guards` value of a policy against `input`.
    ///
    /// Returns every failure in declaration order; an empty list means all
    /// guards passed. `now` is the evaluation instant, read once by the
    /// caller.
    pub fn evaluate(
        &self,
        guards: &Value,
        input: &EvaluationInput,
        now: DateTime<Utc>,
    ) -> PermitResult<Vec<GuardFailure>> {
        let items = match guards {
            Value::Null => return Ok(Vec::new()),
            Value::Array(items) => items,
            other => {
                warn!(found = %json_kind(other), "guard list is not an array");
                return Ok(vec![GuardFailure::new(
                    SCHEMA_GUARD_TYPE,
                    GuardFailureReason::InvalidSchema,
                )
                .with_details(json!({ "expected": "array", "found": json_kind(other) }))]);
            }
        };

        let mut failures = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let spec = match self.parse_item(index, item) {
                Ok(spec) => spec,
                Err(failure) => {
                    failures.push(failure);
                    continue;
                }
            };

            debug!(guard = %spec.kind, index, "evaluating guard");

            if let Some(failure) = self.check(&spec, input, now)? {
                debug!(
                    guard = %failure.guard_type,
                    reason = %failure.reason,
                    "guard failed"
                );
                failures.push(failure);
            }
        }

        debug!(
            flow_type = %input.flow_type,
            action = %input.action_key,
            guard_count = items.len(),
            failure_count = failures.len(),
            "guard evaluation complete"
        );

        Ok(failures)
    }

    // ── Structural phase ──────────────────────────────────────────────────────

    fn parse_item(&self, index: usize, item: &Value) -> Result<GuardSpec, GuardFailure> {
        let errors: Vec<String> = self
            .item_validator
            .iter_errors(item)
            .map(|error| format!("{} at '{}'", error, error.instance_path))
            .collect();

        let parsed = match item {
            Value::Object(map) if errors.is_empty() => map
                .get("type")
                .and_then(Value::as_str)
                .map(|name| {
                    let mut params = map.clone();
                    params.remove("type");
                    GuardSpec {
                        kind: GuardKind::parse(name),
                        params,
                    }
                }),
            _ => None,
        };

        parsed.ok_or_else(|| {
            warn!(index, ?errors, "invalid guard entry");
            GuardFailure::new(SCHEMA_GUARD_TYPE, GuardFailureReason::InvalidItem)
                .with_details(json!({ "index": index, "errors": errors }))
        })
    }

    // ── Semantic phase ────────────────────────────────────────────────────────

    fn check(
        &self,
        spec: &GuardSpec,
        input: &EvaluationInput,
        now: DateTime<Utc>,
    ) -> PermitResult<Option<GuardFailure>> {
        match &spec.kind {
            GuardKind::ApprovalOpen => self.check_approval_open(input),
            GuardKind::ProjectClosed => self.check_project_closed(input),
            GuardKind::PeriodLock => self.check_period_lock(input),
            GuardKind::EditableDays => self.check_editable_days(spec, input, now),
            GuardKind::ChatAckCompleted => self.check_chat_ack(input, now),
            GuardKind::Unknown(name) => {
                warn!(guard = %name, "unknown guard type");
                Ok(Some(GuardFailure::new(
                    name.clone(),
                    GuardFailureReason::UnknownGuardType,
                )))
            }
        }
    }

    /// Fails while the target already has a pending approval instance.
    fn check_approval_open(&self, input: &EvaluationInput) -> PermitResult<Option<GuardFailure>> {
        let kind = GuardKind::ApprovalOpen;
        let Some(target) = &input.target else {
            return Ok(Some(GuardFailure::new(kind.as_str(), GuardFailureReason::TargetRequired)));
        };

        let open = self
            .stores
            .approvals
            .find_open(&input.flow_type, &target.table, &target.id)?;

        Ok(open.map(|instance| {
            GuardFailure::new(kind.as_str(), GuardFailureReason::ApprovalInProgress)
                .with_details(json!({ "instanceId": instance.id }))
        }))
    }

    fn check_project_closed(&self, input: &EvaluationInput) -> PermitResult<Option<GuardFailure>> {
        let kind = GuardKind::ProjectClosed;
        let project_ids = extract::project_ids(&input.state);
        if project_ids.is_empty() {
            return Ok(Some(GuardFailure::new(kind.as_str(), GuardFailureReason::ProjectRequired)));
        }

        let closed = self.stores.projects.find_closed_among(&project_ids)?;
        if closed.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            GuardFailure::new(kind.as_str(), GuardFailureReason::ProjectIsClosed)
                .with_details(json!({ "projectIds": closed })),
        ))
    }

    /// Checks every (period, project) pair against the active locks.
    ///
    /// With no project ids the pairs carry no project and only global locks
    /// can cover them. Lookups always go out as one store call keyed by the
    /// full period and project sets.
    fn check_period_lock(&self, input: &EvaluationInput) -> PermitResult<Option<GuardFailure>> {
        let kind = GuardKind::PeriodLock;
        let period_keys = extract::period_keys(&input.state);
        if period_keys.is_empty() {
            return Ok(Some(GuardFailure::new(kind.as_str(), GuardFailureReason::PeriodRequired)));
        }

        let project_ids = extract::project_ids(&input.state);
        let projects: Vec<Option<&str>> = if project_ids.is_empty() {
            vec![None]
        } else {
            project_ids.iter().map(|p| Some(p.as_str())).collect()
        };

        let pair_count = period_keys.len() * projects.len();
        debug!(pair_count, batched = pair_count > 1, "looking up period locks");

        let locks = self
            .stores
            .period_locks
            .find_active(&period_keys, &project_ids)?;

        let mut locked = Vec::new();
        for period_key in &period_keys {
            for project_id in &projects {
                if let Some(lock) = locks.iter().find(|l| l.covers(period_key, *project_id)) {
                    let scope = match lock.scope {
                        LockScope::Global => "global",
                        LockScope::Project { .. } => "project",
                    };
                    locked.push(json!({
                        "periodKey": period_key,
                        "projectId": project_id,
                        "lockId": lock.id,
                        "scope": scope,
                    }));
                }
            }
        }

        if locked.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            GuardFailure::new(kind.as_str(), GuardFailureReason::PeriodLocked)
                .with_details(json!({ "locked": locked })),
        ))
    }

    /// The guard's own `days` parameter wins over the worklog setting. With
    /// neither, the window is unlimited.
    fn check_editable_days(
        &self,
        spec: &GuardSpec,
        input: &EvaluationInput,
        now: DateTime<Utc>,
    ) -> PermitResult<Option<GuardFailure>> {
        let kind = GuardKind::EditableDays;

        let from_param = spec
            .params
            .get("days")
            .and_then(Value::as_u64)
            .and_then(|d| u32::try_from(d).ok());
        let window = match from_param {
            Some(days) => Some(days),
            None => self.stores.worklog_settings.editable_days()?,
        };
        let Some(days) = window else {
            return Ok(None);
        };

        let work_dates = extract::work_dates(&input.state);
        if work_dates.is_empty() {
            return Ok(Some(GuardFailure::new(kind.as_str(), GuardFailureReason::WorkDateRequired)));
        }

        let today = now.date_naive();
        let earliest = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);

        let expired: Vec<String> = work_dates
            .iter()
            .filter(|d| **d < earliest)
            .map(|d| d.to_string())
            .collect();

        if expired.is_empty() {
            return Ok(None);
        }

        Ok(Some(
            GuardFailure::new(kind.as_str(), GuardFailureReason::EditWindowExpired).with_details(json!({
                "editableDays": days,
                "earliestAllowed": earliest.to_string(),
                "workDates": expired,
            })),
        ))
    }

    /// Every linked chat message must be acknowledged by all of its required
    /// recipients. Requests and acks are each loaded in one batch.
    fn check_chat_ack(
        &self,
        input: &EvaluationInput,
        now: DateTime<Utc>,
    ) -> PermitResult<Option<GuardFailure>> {
        let kind = GuardKind::ChatAckCompleted;
        let Some(target) = &input.target else {
            return Ok(Some(GuardFailure::new(kind.as_str(), GuardFailureReason::TargetRequired)));
        };

        if !self.ack_target_tables.iter().any(|t| *t == target.table) {
            return Ok(Some(
                GuardFailure::new(kind.as_str(), GuardFailureReason::UnsupportedTarget)
                    .with_details(json!({ "table": target.table })),
            ));
        }

        let links = self.stores.ack_links.find_by_target(&target.table, &target.id)?;
        if links.is_empty() {
            return Ok(None);
        }

        let mut request_ids: Vec<String> = Vec::new();
        for link in &links {
            if !request_ids.contains(&link.request_id) {
                request_ids.push(link.request_id.clone());
            }
        }

        let requests = self.stores.ack_requests.find_by_ids(&request_ids)?;
        let acks = self.stores.acks.find_by_requests(&request_ids)?;

        let mut first_failure: Option<GuardFailureReason> = None;
        let mut statuses = Vec::with_capacity(request_ids.len());

        for request_id in &request_ids {
            let request = requests.iter().find(|r| r.id == *request_id);
            let acked: HashSet<&str> = acks
                .iter()
                .filter(|a| a.request_id == *request_id)
                .map(|a| a.user_id.as_str())
                .collect();

            let (status, missing) = ack_status(request, &acked, now);

            if first_failure.is_none() {
                first_failure = status.failure_reason();
            }
            statuses.push(json!({
                "requestId": request_id,
                "status": status.as_str(),
                "missingUserIds": missing,
            }));
        }

        Ok(first_failure.map(|reason| {
            GuardFailure::new(kind.as_str(), reason).with_details(json!({ "requests": statuses }))
        }))
    }
}

// ── Acknowledgement status ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckStatus {
    Complete,
    Canceled,
    MessageDeleted,
    MissingLink,
    Incomplete,
    Expired,
}

impl AckStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Canceled => "canceled",
            Self::MessageDeleted => "message_deleted",
            Self::MissingLink => "missing_link",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
        }
    }

    fn failure_reason(&self) -> Option<GuardFailureReason> {
        match self {
            Self::Complete | Self::Canceled | Self::MessageDeleted => None,
            Self::MissingLink => Some(GuardFailureReason::MissingLink),
            Self::Incomplete => Some(GuardFailureReason::Incomplete),
            Self::Expired => Some(GuardFailureReason::Expired),
        }
    }
}

/// Status of one linked request plus the recipients who have not acked.
fn ack_status(
    request: Option<&AckRequest>,
    acked: &HashSet<&str>,
    now: DateTime<Utc>,
) -> (AckStatus, Vec<String>) {
    let Some(request) = request else {
        return (AckStatus::MissingLink, Vec::new());
    };
    if request.canceled_at.is_some() {
        return (AckStatus::Canceled, Vec::new());
    }
    if request.message_deleted {
        return (AckStatus::MessageDeleted, Vec::new());
    }

    let mut missing: Vec<String> = Vec::new();
    for user_id in &request.required_user_ids {
        if !acked.contains(user_id.as_str()) && !missing.contains(user_id) {
            missing.push(user_id.clone());
        }
    }

    let status = match (missing.is_empty(), request.due_at) {
        (true, _) => AckStatus::Complete,
        (false, Some(due_at)) if due_at < now => AckStatus::Expired,
        (false, _) => AckStatus::Incomplete,
    };
    (status, missing)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Schema every guard entry must satisfy before its kind is looked at.
fn guard_item_schema() -> Value {
    json!({
        "type": "object",
        "required": ["type"],
        "properties": {
            "type": { "type": "string", "minLength": 1 },
            "days": { "type": "integer", "minimum": 0, "maximum": 4294967295u64 }
        }
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
