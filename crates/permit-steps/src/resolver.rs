//! Step definition normalization.
//!
//! Approval rules store their ladder in one of two JSON shapes:
//!
//! ```text
//! flat    [{"approverGroupId": "mgmt", "stepOrder": 1},
//!          {"approverUserId": "u-7", "parallelKey": "legal"}]
//!
//! staged  {"stages": [{"order": 1,
//!                      "completion": {"mode": "quorum", "quorum": 2},
//!                      "approvers": [{"type": "group", "id": "mgmt"}]}]}
//! ```
//!
//! Both normalize into `NormalizedSteps`. The flat shape is lenient: bad
//! entries are dropped. The staged shape is all-or-nothing: one bad stage
//! discards the whole definition.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use permit_contracts::approval::{
    ApprovalStep, Approver, CompletionMode, NormalizedSteps, StagePolicy,
};

/// Why a staged definition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepDefinitionError {
    #[error("'stages' must be a non-empty array")]
    NoStages,

    #[error("stage {index} is not an object")]
    StageNotObject { index: usize },

    #[error("stage {index} has no integer order >= 1")]
    InvalidOrder { index: usize },

    #[error("stage order {order} appears more than once")]
    DuplicateOrder { order: u32 },

    #[error("stage {order} has no approvers")]
    NoApprovers { order: u32 },

    #[error("stage {order} approver {index} must be {{type: group|user, id}}")]
    InvalidApprover { order: u32, index: usize },

    #[error("stage {order} completion must be an object with a string 'mode'")]
    InvalidCompletion { order: u32 },

    #[error("stage {order} has unknown completion mode '{mode}'")]
    UnknownMode { order: u32, mode: String },

    #[error("stage {order} quorum must be an integer between 1 and {approvers}")]
    QuorumOutOfRange { order: u32, approvers: usize },
}

/// Normalize a stored step definition. Returns `None` for anything that
/// does not yield at least one step.
pub fn normalize_rule_steps_with_policy(definition: &Value) -> Option<NormalizedSteps> {
    match definition {
        Value::Array(entries) => parse_legacy(entries),
        Value::Object(map) if map.contains_key("stages") => match parse_staged(map) {
            Ok(steps) => Some(steps),
            Err(e) => {
                debug!(error = %e, "staged step definition rejected");
                None
            }
        },
        _ => None,
    }
}

// ── Flat list ─────────────────────────────────────────────────────────────────

/// How an entry gets its stage order.
enum Placement {
    Explicit(u32),
    Parallel(String),
    Sequential,
}

/// Normalize the flat list shape.
///
/// Entries without exactly one approver are dropped. A finite `stepOrder`
/// of at least 1 is used as-is (truncated). Other entries take the next order
/// after the highest one assigned so far; entries sharing a `parallelKey`
/// share the order given to the first of them.
pub fn parse_legacy(entries: &[Value]) -> Option<NormalizedSteps> {
    let mut steps: Vec<ApprovalStep> = Vec::new();
    let mut parallel_orders: BTreeMap<String, u32> = BTreeMap::new();
    let mut highest: u32 = 0;

    for (index, entry) in entries.iter().enumerate() {
        let Some(map) = entry.as_object() else {
            debug!(index, "step entry is not an object; ignored");
            continue;
        };
        let Some(approver) = legacy_approver(map) else {
            debug!(index, "step entry needs exactly one approver; ignored");
            continue;
        };

        let order = match placement(map) {
            Placement::Explicit(order) => order,
            Placement::Parallel(key) => match parallel_orders.get(&key) {
                Some(order) => *order,
                None => {
                    let order = highest.saturating_add(1);
                    parallel_orders.insert(key, order);
                    order
                }
            },
            Placement::Sequential => highest.saturating_add(1),
        };

        highest = highest.max(order);
        let step = ApprovalStep::new(approver, order);
        if steps.contains(&step) {
            debug!(index, order, "duplicate approver at stage; ignored");
            continue;
        }
        steps.push(step);
    }

    if steps.is_empty() {
        return None;
    }

    steps.sort_by_key(|s| s.step_order);
    let stage_policy = StagePolicy::all_for(steps.iter().map(|s| s.step_order));

    Some(NormalizedSteps { steps, stage_policy })
}

fn legacy_approver(map: &Map<String, Value>) -> Option<Approver> {
    let group = non_empty_str(map.get("approverGroupId"));
    let user = non_empty_str(map.get("approverUserId"));
    match (group, user) {
        (Some(group), None) => Some(Approver::group(group)),
        (None, Some(user)) => Some(Approver::user(user)),
        _ => None,
    }
}

fn placement(map: &Map<String, Value>) -> Placement {
    let explicit = map
        .get("stepOrder")
        .and_then(Value::as_f64)
        .filter(|o| o.is_finite() && *o >= 1.0 && *o <= f64::from(u32::MAX));
    if let Some(order) = explicit {
        return Placement::Explicit(order.trunc() as u32);
    }

    let key = match map.get("parallelKey") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    match key {
        Some(key) => Placement::Parallel(key),
        None => Placement::Sequential,
    }
}

// ── Staged definition ─────────────────────────────────────────────────────────

/// Validate and normalize the staged shape.
///
/// # Errors
///
/// The first problem found, as a `StepDefinitionError`. Nothing is returned
/// for the stages that were valid.
pub fn parse_staged(definition: &Map<String, Value>) -> Result<NormalizedSteps, StepDefinitionError> {
    let stages = match definition.get("stages") {
        Some(Value::Array(stages)) if !stages.is_empty() => stages,
        _ => return Err(StepDefinitionError::NoStages),
    };

    let mut by_order: BTreeMap<u32, (CompletionMode, Vec<Approver>)> = BTreeMap::new();

    for (index, stage) in stages.iter().enumerate() {
        let stage = stage
            .as_object()
            .ok_or(StepDefinitionError::StageNotObject { index })?;

        let order = stage
            .get("order")
            .and_then(positive_u32)
            .ok_or(StepDefinitionError::InvalidOrder { index })?;
        if by_order.contains_key(&order) {
            return Err(StepDefinitionError::DuplicateOrder { order });
        }

        let approvers = stage_approvers(order, stage.get("approvers"))?;
        let mode = completion_mode(order, stage.get("completion"), approvers.len())?;

        by_order.insert(order, (mode, approvers));
    }

    let mut steps = Vec::new();
    let mut stage_policy = StagePolicy::default();
    for (order, (mode, approvers)) in by_order {
        stage_policy.insert(order, mode);
        steps.extend(approvers.into_iter().map(|a| ApprovalStep::new(a, order)));
    }

    Ok(NormalizedSteps { steps, stage_policy })
}

/// Distinct approvers of one stage, in declaration order.
fn stage_approvers(order: u32, value: Option<&Value>) -> Result<Vec<Approver>, StepDefinitionError> {
    let entries = match value {
        Some(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => return Err(StepDefinitionError::NoApprovers { order }),
    };

    let mut approvers: Vec<Approver> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        let invalid = StepDefinitionError::InvalidApprover { order, index };
        let id = non_empty_str(entry.get("id")).ok_or_else(|| invalid.clone())?;
        let approver = match entry.get("type").and_then(Value::as_str) {
            Some("group") => Approver::group(id),
            Some("user") => Approver::user(id),
            _ => return Err(invalid),
        };
        if !approvers.contains(&approver) {
            approvers.push(approver);
        }
    }
    Ok(approvers)
}

fn completion_mode(
    order: u32,
    value: Option<&Value>,
    approver_count: usize,
) -> Result<CompletionMode, StepDefinitionError> {
    let completion = match value {
        None | Some(Value::Null) => return Ok(CompletionMode::All),
        Some(Value::Object(completion)) => completion,
        Some(_) => return Err(StepDefinitionError::InvalidCompletion { order }),
    };

    let mode = completion
        .get("mode")
        .and_then(Value::as_str)
        .ok_or(StepDefinitionError::InvalidCompletion { order })?;

    match mode {
        "all" => Ok(CompletionMode::All),
        "any" => Ok(CompletionMode::Any),
        "quorum" => {
            let quorum = completion
                .get("quorum")
                .and_then(positive_u32)
                .filter(|q| *q as usize <= approver_count)
                .ok_or(StepDefinitionError::QuorumOutOfRange {
                    order,
                    approvers: approver_count,
                })?;
            Ok(CompletionMode::Quorum { quorum })
        }
        other => Err(StepDefinitionError::UnknownMode {
            order,
            mode: other.to_string(),
        }),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// An integral JSON number in `1..=u32::MAX`.
fn positive_u32(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok().filter(|n| *n >= 1);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= f64::from(u32::MAX))
        .map(|f| f as u32)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
