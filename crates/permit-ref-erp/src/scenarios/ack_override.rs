//! Scenario 3: Acknowledgement override
//!
//! A 30,000 invoice is pending at the management stage. Before approval,
//! sales and operations must both acknowledge a chat message linked to the
//! approval instance; only sales has.
//!
//!   1. Manager approves             → deny, ack incomplete
//!   2. Clock passes the due time    → deny, ack expired
//!   3. Admin approves, no reason    → reason required
//!   4. Admin approves with reason   → allowed as a guard override
//!   5. The override is in the audit trail with its justification

use chrono::Duration;
use serde_json::json;

use permit_contracts::{
    decision::FallbackDecision,
    error::{PermitError, PermitResult},
    external::AckRequest,
    instance::{ApprovalAction, ApprovalInstance},
    record::DecisionRecord,
    request::{Actor, EntityState, TargetRef},
};
use permit_core::flow::{ActOutcome, Submission, SubmitOutcome, INSTANCE_TABLE};

use crate::mock_data::{admin, author, manager};
use crate::runtime::ErpRuntime;
use crate::scenarios::{describe, scenario_now};

pub const OVERRIDE_REASON: &str = "ops confirmed by phone; chat outage";

/// Submit a pending invoice and link an ack request that only sales has
/// confirmed.
pub fn pending_with_open_ack(runtime: &ErpRuntime) -> PermitResult<ApprovalInstance> {
    let plan = runtime.plan("invoice", &json!({ "amount": 30_000 }));
    let submission = Submission {
        flow_type: "invoice".to_string(),
        target: TargetRef::new("invoices", "inv-2001"),
        actor: author(),
        state: EntityState::with_status("draft"),
        reason_text: None,
        ladder: plan.ladder,
    };

    let instance = match runtime.submit(submission)? {
        SubmitOutcome::Created { instance, .. } => instance,
        SubmitOutcome::Denied { outcome } => {
            return Err(PermitError::state_machine(format!(
                "submission denied: {}",
                describe(&outcome)
            )))
        }
    };

    let now = scenario_now();
    runtime.erp.request_ack(
        AckRequest {
            id: "ack-1".to_string(),
            message_id: "msg-77".to_string(),
            required_user_ids: vec!["u-sales".to_string(), "u-ops".to_string()],
            canceled_at: None,
            message_deleted: false,
            due_at: Some(now + Duration::days(2)),
        },
        TargetRef::new(INSTANCE_TABLE, instance.id.to_string()),
    );
    runtime.erp.ack("ack-1", "u-sales", now);

    Ok(instance)
}

/// Try to approve; returns the instance to keep using and the gate outcome.
pub fn try_approve(
    runtime: &ErpRuntime,
    instance: ApprovalInstance,
    actor: &Actor,
    reason: Option<&str>,
) -> PermitResult<(ApprovalInstance, FallbackDecision)> {
    let outcome = runtime.act(
        instance,
        ApprovalAction::Approve,
        actor,
        EntityState::with_status("pending"),
        reason.map(str::to_string),
    )?;
    Ok(match outcome {
        ActOutcome::Advanced { instance, outcome }
        | ActOutcome::Finished { instance, outcome }
        | ActOutcome::Denied { instance, outcome } => (instance, outcome),
    })
}

/// The most recent audited decision.
pub fn last_record(runtime: &ErpRuntime) -> Option<DecisionRecord> {
    runtime
        .audit
        .export_log()
        .events
        .last()
        .map(|e| e.record.clone())
}

/// Run Scenario 3: Acknowledgement override.
pub fn run_scenario() -> PermitResult<()> {
    println!("=== Scenario 3: Acknowledgement Override ===");
    println!();

    let runtime = ErpRuntime::bundled(scenario_now())?;
    let instance = pending_with_open_ack(&runtime)?;

    println!("  Invoice:   inv-2001, amount 30000, instance {}", instance.id);
    println!("  Ack:       ack-1 requires u-sales, u-ops; u-sales acked");
    println!();

    let (instance, outcome) = try_approve(&runtime, instance, &manager(), None)?;
    println!("  1. manager approves              {}", describe(&outcome));

    runtime.clock.set(scenario_now() + Duration::days(3));
    let (instance, outcome) = try_approve(&runtime, instance, &manager(), None)?;
    println!("  2. manager approves after due    {}", describe(&outcome));

    let (instance, outcome) = try_approve(&runtime, instance, &admin(), None)?;
    println!("  3. admin approves, no reason     {}", describe(&outcome));

    let (instance, outcome) = try_approve(&runtime, instance, &admin(), Some(OVERRIDE_REASON))?;
    println!("  4. admin approves with reason    {}", describe(&outcome));
    println!("     instance status: {}", instance.status);
    println!();

    if let Some(record) = last_record(&runtime) {
        println!(
            "  Audit:     override={} by {} reason=\"{}\"",
            record.outcome.decision.guard_override,
            record.actor_id,
            record.reason_text.unwrap_or_default()
        );
    }
    println!(
        "  Chain:     {}",
        if runtime.audit.verify_integrity() { "VALID" } else { "BROKEN" }
    );
    println!();

    Ok(())
}
