//! Scenario 4: Staged quorum
//!
//! An expense of 2,500 matches `expense-staged`: any two of alice, bob, and
//! carol, then one member of finance. No expense policies are configured,
//! so every action is gated under legacy rules.
//!
//!   1. Submission is allowed without a policy (`policyApplied = false`)
//!   2. Alice approves; stage 1 waits for a second reviewer
//!   3. Alice approving twice is refused by the state machine
//!   4. Bob approves; the quorum is met and stage 2 opens
//!   5. Carol is not a finance approver
//!   6. A finance clerk approves; the expense is approved

use serde_json::json;

use permit_contracts::{
    approval::CompletionMode,
    error::{PermitError, PermitResult},
    instance::{ApprovalAction, ApprovalInstance},
    request::{Actor, EntityState, TargetRef},
};
use permit_core::flow::{ActOutcome, Submission, SubmitOutcome};
use permit_steps::ApprovalPlan;

use crate::mock_data::{author, finance_clerk, reviewer};
use crate::runtime::ErpRuntime;
use crate::scenarios::{describe, scenario_now};

/// Plan and submit an expense; returns the plan and the pending instance.
pub fn submit_expense(
    runtime: &ErpRuntime,
    expense_id: &str,
    amount: f64,
) -> PermitResult<(ApprovalPlan, ApprovalInstance)> {
    let plan = runtime.plan("expense", &json!({ "amount": amount }));
    let submission = Submission {
        flow_type: "expense".to_string(),
        target: TargetRef::new("expenses", expense_id),
        actor: author(),
        state: EntityState::with_status("draft"),
        reason_text: None,
        ladder: plan.ladder.clone(),
    };

    match runtime.submit(submission)? {
        SubmitOutcome::Created { instance, .. } => Ok((plan, instance)),
        SubmitOutcome::Denied { outcome } => Err(PermitError::state_machine(format!(
            "expense {expense_id} submission denied: {}",
            describe(&outcome)
        ))),
    }
}

/// Apply `action` by `actor` and return the resulting instance.
pub fn apply(
    runtime: &ErpRuntime,
    instance: ApprovalInstance,
    action: ApprovalAction,
    actor: &Actor,
) -> PermitResult<ApprovalInstance> {
    match runtime.act(instance, action, actor, EntityState::default(), None)? {
        ActOutcome::Advanced { instance, .. } | ActOutcome::Finished { instance, .. } => Ok(instance),
        ActOutcome::Denied { outcome, .. } => Err(PermitError::state_machine(format!(
            "{} by {} denied: {}",
            action.action_key(),
            actor.user_id,
            describe(&outcome)
        ))),
    }
}

fn progress(instance: &ApprovalInstance) -> String {
    let order = instance.current_step;
    let total = instance.steps_at(order).count();
    let done = instance.satisfied_at(order).len();
    format!(
        "stage {order} ({}): {done}/{total} approved, status {}",
        instance.stage_policy.mode_for(order),
        instance.status
    )
}

/// Run Scenario 4: Staged quorum.
pub fn run_scenario() -> PermitResult<()> {
    println!("=== Scenario 4: Staged Quorum ===");
    println!();

    let runtime = ErpRuntime::bundled(scenario_now())?;
    let (plan, instance) = submit_expense(&runtime, "exp-501", 2_500.0)?;

    println!("  Expense:  exp-501, amount 2500");
    println!("  Rule:     {}", plan.rule_id.as_deref().unwrap_or("-"));
    for (order, mode) in plan.ladder.stage_policy.iter() {
        let quorum = match mode {
            CompletionMode::Quorum { quorum } => format!(" of {quorum}"),
            _ => String::new(),
        };
        println!("  Stage {order}:  {mode}{quorum}");
    }
    println!();

    let alice = reviewer("u-alice");
    let bob = reviewer("u-bob");
    let carol = reviewer("u-carol");

    let instance = apply(&runtime, instance, ApprovalAction::Approve, &alice)?;
    println!("  1. alice approves     {}", progress(&instance));

    match runtime.act(instance.clone(), ApprovalAction::Approve, &alice, EntityState::default(), None) {
        Err(e) => println!("  2. alice again        refused: {e}"),
        Ok(_) => println!("  2. alice again        unexpectedly accepted"),
    }

    let instance = apply(&runtime, instance, ApprovalAction::Approve, &bob)?;
    println!("  3. bob approves       {}", progress(&instance));

    match runtime.act(instance.clone(), ApprovalAction::Approve, &carol, EntityState::default(), None) {
        Err(e) => println!("  4. carol approves     refused: {e}"),
        Ok(_) => println!("  4. carol approves     unexpectedly accepted"),
    }

    let instance = apply(&runtime, instance, ApprovalAction::Approve, &finance_clerk())?;
    println!("  5. finance approves   status {}", instance.status);
    println!();

    Ok(())
}
