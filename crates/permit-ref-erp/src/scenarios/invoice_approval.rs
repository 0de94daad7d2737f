//! Scenario 1: Invoice approval
//!
//! An invoice of 120,000 is submitted and walked up its ladder.
//!
//!   1. The planner finds no explicit steps on `invoice-default` and derives
//!      the amount-driven chain: mgmt@1, exec@2
//!   2. `invoice-submit` allows the draft; the instance waits at
//!      `pending_qa`
//!   3. A second submission of the same invoice is refused by
//!      `approval_open` while the first is pending
//!   4. The manager approves; the instance moves to `pending_exec`
//!   5. The executive approves; the instance is approved and sealed
//!   6. Audit chain integrity is verified

use serde_json::json;

use permit_contracts::{
    approval::PendingStatus,
    decision::FallbackDecision,
    error::{PermitError, PermitResult},
    instance::{ApprovalAction, ApprovalInstance},
    request::{Actor, EntityState, TargetRef},
};
use permit_core::flow::{ActOutcome, Submission, SubmitOutcome};
use permit_steps::ApprovalPlan;

use crate::mock_data::{author, executive, manager};
use crate::runtime::ErpRuntime;
use crate::scenarios::{describe, scenario_now};

/// What happened to one invoice.
#[derive(Debug)]
pub struct InvoiceWalk {
    pub plan: ApprovalPlan,
    /// Pending label after submission and after every intermediate stage.
    pub labels: Vec<PendingStatus>,
    pub resubmission: FallbackDecision,
    pub instance: ApprovalInstance,
}

fn submission(invoice_id: &str, plan: &ApprovalPlan) -> Submission {
    Submission {
        flow_type: "invoice".to_string(),
        target: TargetRef::new("invoices", invoice_id),
        actor: author(),
        state: EntityState::with_status("draft"),
        reason_text: None,
        ladder: plan.ladder.clone(),
    }
}

/// The scenario user who can approve the current stage.
fn approver_for(runtime: &ErpRuntime, instance: &ApprovalInstance) -> Actor {
    match runtime.pending_status(instance) {
        PendingStatus::PendingExec => executive(),
        PendingStatus::PendingQa => manager(),
    }
}

/// Submit `invoice_id` for `amount` and approve every stage.
pub fn walk_invoice(runtime: &ErpRuntime, invoice_id: &str, amount: f64) -> PermitResult<InvoiceWalk> {
    let plan = runtime.plan("invoice", &json!({ "amount": amount }));

    let mut instance = match runtime.submit(submission(invoice_id, &plan))? {
        SubmitOutcome::Created { instance, .. } => instance,
        SubmitOutcome::Denied { outcome } => {
            return Err(PermitError::state_machine(format!(
                "invoice {invoice_id} submission denied: {}",
                describe(&outcome)
            )))
        }
    };
    let mut labels = vec![runtime.pending_status(&instance)];

    let resubmission = match runtime.submit(submission(invoice_id, &plan))? {
        SubmitOutcome::Denied { outcome } => outcome,
        SubmitOutcome::Created { instance: duplicate, .. } => {
            return Err(PermitError::state_machine(format!(
                "duplicate instance {} created for invoice {invoice_id}",
                duplicate.id
            )))
        }
    };

    loop {
        let actor = approver_for(runtime, &instance);
        match runtime.act(
            instance,
            ApprovalAction::Approve,
            &actor,
            EntityState::with_status("pending"),
            None,
        )? {
            ActOutcome::Advanced { instance: next, .. } => {
                labels.push(runtime.pending_status(&next));
                instance = next;
            }
            ActOutcome::Finished { instance: done, .. } => {
                instance = done;
                break;
            }
            ActOutcome::Denied { outcome, .. } => {
                return Err(PermitError::state_machine(format!(
                    "approval by {} denied: {}",
                    actor.user_id,
                    describe(&outcome)
                )))
            }
        }
    }

    Ok(InvoiceWalk {
        plan,
        labels,
        resubmission,
        instance,
    })
}

/// Run Scenario 1: Invoice approval.
pub fn run_scenario() -> PermitResult<()> {
    println!("=== Scenario 1: Invoice Approval ===");
    println!();

    let runtime = ErpRuntime::bundled(scenario_now())?;
    let walk = walk_invoice(&runtime, "inv-1001", 120_000.0)?;

    let ladder: Vec<String> = walk
        .plan
        .ladder
        .steps
        .iter()
        .map(|s| format!("{}@{}", s.approver.group_id().unwrap_or("user"), s.step_order))
        .collect();
    println!("  Invoice:  inv-1001, amount 120000");
    println!(
        "  Rule:     {} (default chain: {})",
        walk.plan.rule_id.as_deref().unwrap_or("-"),
        walk.plan.used_default
    );
    println!("  Ladder:   {}", ladder.join(" -> "));
    println!();

    for (i, label) in walk.labels.iter().enumerate() {
        println!("  Stage {}:  {}", i + 1, label);
    }
    println!("  Resubmit: {}", describe(&walk.resubmission));
    println!("  Final:    {}", walk.instance.status);
    println!();

    let intact = runtime.audit.verify_integrity();
    println!(
        "  Audit:    {} records, chain {}",
        runtime.audit.len(),
        if intact { "VALID" } else { "BROKEN" }
    );
    println!();

    Ok(())
}
