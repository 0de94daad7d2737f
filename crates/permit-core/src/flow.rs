//! The approval flow: the policy-gated approval-instance state machine.
//!
//! ```text
//!   submit ─► pending(first stage) ─► … ─► pending(last stage) ─► approved
//!                 │                              │
//!                 └── reject ─► rejected         └── cancel ─► cancelled
//! ```
//!
//! Every transition is gated: `ActionGate::evaluate_with_fallback()` runs
//! before anything changes, and every gate decision, allowed or denied, is
//! written to the `AuditWriter`. A stage completes according to its
//! `CompletionMode`; the flow then moves to the next stage order or, after
//! the last one, to `Approved`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use permit_contracts::{
    approval::{Approver, NormalizedSteps},
    decision::FallbackDecision,
    error::{PermitError, PermitResult},
    instance::{ApprovalAction, ApprovalInstance, InstanceId, InstanceStatus, StageAction},
    record::DecisionRecord,
    request::{Actor, EntityState, EvaluationInput, TargetRef},
};

use crate::traits::{ActionGate, AuditWriter, Clock};

/// Target table the flow reports when gating actions on an instance.
pub const INSTANCE_TABLE: &str = "approval_instances";

/// A document submitted for approval.
#[derive(Debug, Clone)]
pub struct Submission {
    pub flow_type: String,
    /// The document being submitted.
    pub target: TargetRef,
    pub actor: Actor,
    pub state: EntityState,
    pub reason_text: Option<String>,
    /// The ladder chosen at submission time.
    pub ladder: NormalizedSteps,
}

/// The outcome of `ApprovalFlow::submit`.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The gate allowed the submission and an instance now awaits its first
    /// stage.
    Created {
        instance: ApprovalInstance,
        outcome: FallbackDecision,
    },
    /// The gate refused the submission. No instance exists.
    Denied { outcome: FallbackDecision },
}

/// The outcome of `ApprovalFlow::act`.
#[derive(Debug)]
pub enum ActOutcome {
    /// The action was recorded and the instance is still pending.
    Advanced {
        instance: ApprovalInstance,
        outcome: FallbackDecision,
    },
    /// The instance reached a terminal status.
    Finished {
        instance: ApprovalInstance,
        outcome: FallbackDecision,
    },
    /// The gate refused the action. The instance is returned unchanged.
    Denied {
        instance: ApprovalInstance,
        outcome: FallbackDecision,
    },
}

/// Drives approval instances through their ladders.
///
/// The flow holds no per-instance state: callers load an instance, pass it
/// to `act()`, and persist what comes back.
pub struct ApprovalFlow {
    gate: Arc<dyn ActionGate>,
    audit: Arc<dyn AuditWriter>,
    clock: Arc<dyn Clock>,
}

impl ApprovalFlow {
    pub fn new(gate: Arc<dyn ActionGate>, audit: Arc<dyn AuditWriter>, clock: Arc<dyn Clock>) -> Self {
        Self { gate, audit, clock }
    }

    /// Gate a submission and, if allowed, create a pending instance at the
    /// lowest stage order of the ladder.
    ///
    /// # Errors
    ///
    /// `StateMachineError` for an empty ladder; store and audit failures are
    /// propagated. A gate denial is not an error.
    pub fn submit(&self, submission: Submission) -> PermitResult<SubmitOutcome> {
        let first_order = submission
            .ladder
            .orders()
            .first()
            .copied()
            .ok_or_else(|| PermitError::state_machine("cannot submit with an empty approval ladder"))?;

        let input = EvaluationInput {
            flow_type: submission.flow_type.clone(),
            action_key: "submit".to_string(),
            actor: submission.actor.clone(),
            state: submission.state,
            reason_text: submission.reason_text.clone(),
            target: Some(submission.target.clone()),
        };

        let outcome = self.gate.evaluate_with_fallback(&input)?;

        if !outcome.allowed() {
            warn!(
                flow_type = %input.flow_type,
                target = %submission.target.id,
                reason = ?outcome.decision.reason,
                "submission denied"
            );
            self.record(&input, &outcome, None)?;
            return Ok(SubmitOutcome::Denied { outcome });
        }

        let instance = ApprovalInstance {
            id: InstanceId::new(),
            flow_type: submission.flow_type,
            target: submission.target,
            steps: submission.ladder.steps,
            stage_policy: submission.ladder.stage_policy,
            current_step: first_order,
            status: InstanceStatus::Pending,
            actions: Vec::new(),
            created_by: submission.actor.user_id,
            created_at: self.clock.now(),
        };

        self.record(&input, &outcome, Some(instance.status))?;

        info!(
            instance_id = %instance.id,
            flow_type = %instance.flow_type,
            stage = instance.current_step,
            "approval instance created"
        );

        Ok(SubmitOutcome::Created { instance, outcome })
    }

    /// Gate and apply one action to a pending instance.
    ///
    /// # Pipeline
    ///
    /// 1. Refuse actions on terminal instances (`StateMachineError`)
    /// 2. Evaluate the gate with the instance as target; a denial is audited
    ///    and returned as `ActOutcome::Denied`
    /// 3. For approve/reject, the actor must match an approver at the current
    ///    stage (`NotAnApprover`) and may approve a stage only once
    /// 4. Apply the action, advancing the stage when its completion mode is
    ///    satisfied
    /// 5. Audit the applied action; finalize the audit stream when terminal
    pub fn act(
        &self,
        mut instance: ApprovalInstance,
        action: ApprovalAction,
        actor: &Actor,
        state: EntityState,
        reason_text: Option<String>,
    ) -> PermitResult<ActOutcome> {
        if instance.status.is_terminal() {
            return Err(PermitError::state_machine(format!(
                "instance {} is already {}",
                instance.id, instance.status
            )));
        }

        let input = EvaluationInput {
            flow_type: instance.flow_type.clone(),
            action_key: action.action_key().to_string(),
            actor: actor.clone(),
            state,
            reason_text,
            target: Some(TargetRef::new(INSTANCE_TABLE, instance.id.to_string())),
        };

        let outcome = self.gate.evaluate_with_fallback(&input)?;

        if !outcome.allowed() {
            warn!(
                instance_id = %instance.id,
                action = %input.action_key,
                user_id = %actor.user_id,
                reason = ?outcome.decision.reason,
                "action denied"
            );
            self.record(&input, &outcome, Some(instance.status))?;
            return Ok(ActOutcome::Denied { instance, outcome });
        }

        let order = instance.current_step;
        let now = self.clock.now();

        match action {
            ApprovalAction::Cancel => {
                instance.status = InstanceStatus::Cancelled;
            }
            ApprovalAction::Reject => {
                if !instance.steps_at(order).any(|s| s.approver.admits(actor)) {
                    return Err(PermitError::NotAnApprover {
                        user_id: actor.user_id.clone(),
                        step_order: order,
                    });
                }
                instance.actions.push(StageAction {
                    user_id: actor.user_id.clone(),
                    step_order: order,
                    action,
                    approver: None,
                    step_index: None,
                    at: now,
                });
                instance.status = InstanceStatus::Rejected;
            }
            ApprovalAction::Approve => {
                self.apply_approval(&mut instance, actor, now)?;
            }
        }

        if outcome.decision.guard_override {
            warn!(
                instance_id = %instance.id,
                user_id = %actor.user_id,
                policy_id = ?outcome.decision.matched_policy_id,
                "guard override applied"
            );
        }

        self.record(&input, &outcome, Some(instance.status))?;

        if instance.status.is_terminal() {
            info!(
                instance_id = %instance.id,
                status = %instance.status,
                "approval instance finished"
            );
            self.audit.finalize(&instance.id.to_string())?;
            Ok(ActOutcome::Finished { instance, outcome })
        } else {
            Ok(ActOutcome::Advanced { instance, outcome })
        }
    }

    /// Record an approval at the current stage and advance if the stage is
    /// complete.
    fn apply_approval(
        &self,
        instance: &mut ApprovalInstance,
        actor: &Actor,
        now: chrono::DateTime<chrono::Utc>,
    ) -> PermitResult<()> {
        let order = instance.current_step;

        let already_approved = instance.actions.iter().any(|a| {
            a.user_id == actor.user_id && a.step_order == order && a.action == ApprovalAction::Approve
        });
        if already_approved {
            return Err(PermitError::state_machine(format!(
                "user '{}' already approved stage {}",
                actor.user_id, order
            )));
        }

        let step_index = open_entry_for(instance, order, actor).ok_or_else(|| {
            PermitError::NotAnApprover {
                user_id: actor.user_id.clone(),
                step_order: order,
            }
        })?;

        instance.actions.push(StageAction {
            user_id: actor.user_id.clone(),
            step_order: order,
            action: ApprovalAction::Approve,
            approver: Some(instance.steps[step_index].approver.clone()),
            step_index: Some(step_index),
            at: now,
        });

        let satisfied = instance.satisfied_indices(order).len();
        let total = instance.steps_at(order).count();
        let mode = instance.stage_policy.mode_for(order);

        debug!(
            instance_id = %instance.id,
            stage = order,
            satisfied,
            total,
            mode = ?mode,
            "approval recorded"
        );

        if mode.is_satisfied(satisfied, total) {
            match instance.next_order_after(order) {
                Some(next) => {
                    info!(instance_id = %instance.id, from = order, to = next, "stage complete");
                    instance.current_step = next;
                }
                None => instance.status = InstanceStatus::Approved,
            }
        }

        Ok(())
    }

    fn record(
        &self,
        input: &EvaluationInput,
        outcome: &FallbackDecision,
        instance_status: Option<InstanceStatus>,
    ) -> PermitResult<()> {
        let record = DecisionRecord {
            flow_type: input.flow_type.clone(),
            action_key: input.action_key.clone(),
            actor_id: input.actor.user_id.clone(),
            target: input.target.clone(),
            outcome: outcome.clone(),
            reason_text: input.reason_text.clone(),
            instance_status,
            timestamp: self.clock.now(),
        };
        self.audit.write(&record)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Index of the unsatisfied entry at `order` that an approval by `actor`
/// fills. An entry naming the actor is filled before any group entry.
fn open_entry_for(instance: &ApprovalInstance, order: u32, actor: &Actor) -> Option<usize> {
    let satisfied = instance.satisfied_indices(order);
    let open: Vec<(usize, &Approver)> = instance
        .steps
        .iter()
        .enumerate()
        .filter(|(i, s)| s.step_order == order && !satisfied.contains(i))
        .map(|(i, s)| (i, &s.approver))
        .filter(|(_, approver)| approver.admits(actor))
        .collect();

    open.iter()
        .find(|(_, approver)| matches!(approver, Approver::User(_)))
        .or_else(|| open.first())
        .map(|(i, _)| *i)
}
