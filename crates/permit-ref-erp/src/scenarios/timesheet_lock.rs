//! Scenario 2: Timesheet lock
//!
//! Time entries are gated by three guards on `time-submit` (closed project,
//! period lock, edit window). Managers get a lower-priority policy that
//! drops the edit window but requires a justification.
//!
//! Seeded state, with the clock at 2026-10-15:
//!   - edit window 14 days, so the earliest editable day is 2026-10-01
//!   - August 2026 is locked for every project
//!   - project `p-archived` is closed
//!
//! Cases:
//!   1. Worker, current entry                 → allow (time-submit)
//!   2. Worker, September entry               → deny, edit window expired
//!   3. Manager, September entry, no reason   → reason required
//!   4. Manager, September entry, reason      → allow (manager-late)
//!   5. Manager, August entry, reason         → deny, period locked
//!   6. Worker, closed project                → deny, project closed
//!   7. Worker, two projects over two dates   → allow, one lock lookup

use chrono::NaiveDate;

use permit_contracts::{
    decision::FallbackDecision,
    error::PermitResult,
    external::LockScope,
    request::{Actor, EntityState, EvaluationInput},
};

use crate::mock_data::{manager, worker};
use crate::runtime::ErpRuntime;
use crate::scenarios::{describe, scenario_now};

/// A runtime seeded with the lock, window, and project state above.
pub fn seeded_runtime() -> PermitResult<ErpRuntime> {
    let runtime = ErpRuntime::bundled(scenario_now())?;
    runtime.erp.set_editable_days(Some(14));
    runtime.erp.lock_period("lock-aug", "2026-08", LockScope::Global);
    runtime.erp.set_project_status("p-live", "active");
    runtime.erp.set_project_status("p-other", "active");
    runtime.erp.set_project_status("p-archived", "closed");
    Ok(runtime)
}

/// A time entry for one project on one day.
pub fn entry(project_id: &str, work_date: NaiveDate) -> EntityState {
    EntityState {
        project_id: Some(project_id.to_string()),
        work_date: Some(work_date),
        ..EntityState::default()
    }
}

/// Gate a time entry submission.
pub fn submit_entry(
    runtime: &ErpRuntime,
    actor: Actor,
    state: EntityState,
    reason: Option<&str>,
) -> PermitResult<FallbackDecision> {
    let mut input = EvaluationInput::new("time", "submit", actor).with_state(state);
    if let Some(reason) = reason {
        input = input.with_reason(reason);
    }
    runtime.evaluate(&input)
}

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap_or(NaiveDate::MIN)
}

/// Run Scenario 2: Timesheet lock.
pub fn run_scenario() -> PermitResult<()> {
    println!("=== Scenario 2: Timesheet Lock ===");
    println!();
    println!("  Edit window: 14 days (earliest 2026-10-01)");
    println!("  Locked:      2026-08 (global)");
    println!("  Closed:      p-archived");
    println!();

    let runtime = seeded_runtime()?;
    let late_reason = Some("client sign-off arrived late");

    let cases: Vec<(&str, Actor, EntityState, Option<&str>)> = vec![
        ("worker, current entry", worker(), entry("p-live", day(10, 10)), None),
        ("worker, September entry", worker(), entry("p-live", day(9, 20)), None),
        ("manager, September, no reason", manager(), entry("p-live", day(9, 20)), None),
        ("manager, September, reason", manager(), entry("p-live", day(9, 20)), late_reason),
        ("manager, August, reason", manager(), entry("p-live", day(8, 28)), late_reason),
        ("worker, closed project", worker(), entry("p-archived", day(10, 10)), None),
    ];

    for (i, (label, actor, state, reason)) in cases.into_iter().enumerate() {
        let outcome = submit_entry(&runtime, actor, state, reason)?;
        println!("  {}. {:<32} {}", i + 1, label, describe(&outcome));
    }

    runtime.erp.reset_lookups();
    let batch = EntityState {
        project_ids: vec!["p-live".to_string(), "p-other".to_string()],
        work_dates: vec![day(10, 5), day(10, 12)],
        ..EntityState::default()
    };
    let outcome = submit_entry(&runtime, worker(), batch, None)?;
    println!("  7. {:<32} {}", "worker, two projects, two dates", describe(&outcome));
    println!(
        "     period lock lookups: {}",
        runtime.erp.lookups().period_locks
    );
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use permit_contracts::{decision::DenyReason, guard::GuardFailureReason};

    use super::{day, entry, run_scenario, seeded_runtime, submit_entry};
    use crate::mock_data::{manager, worker};

    #[test]
    fn current_entry_is_allowed() {
        let runtime = seeded_runtime().unwrap();
        let outcome = submit_entry(&runtime, worker(), entry("p-live", day(10, 10)), None).unwrap();
        assert!(outcome.allowed());
        assert!(outcome.policy_applied);
        assert_eq!(outcome.decision.matched_policy_id.as_deref(), Some("time-submit"));
    }

    #[test]
    fn late_entry_denied_for_worker() {
        let runtime = seeded_runtime().unwrap();
        let outcome = submit_entry(&runtime, worker(), entry("p-live", day(9, 20)), None).unwrap();

        let decision = &outcome.decision;
        assert!(decision.is_denied_for(DenyReason::GuardFailed));
        assert_eq!(decision.matched_policy_id.as_deref(), Some("time-submit"));
        assert_eq!(decision.guard_failures.len(), 1);
        assert_eq!(decision.guard_failures[0].reason, GuardFailureReason::EditWindowExpired);
        assert_eq!(decision.guard_failures[0].details["earliestAllowed"], json!("2026-10-01"));
    }

    #[test]
    fn manager_late_entry_needs_reason() {
        let runtime = seeded_runtime().unwrap();

        let without = submit_entry(&runtime, manager(), entry("p-live", day(9, 20)), None).unwrap();
        assert!(without.decision.is_denied_for(DenyReason::ReasonRequired));
        assert!(without.decision.guard_failures.is_empty());

        let with = submit_entry(&runtime, manager(), entry("p-live", day(9, 20)), Some("late sign-off"))
            .unwrap();
        assert!(with.allowed());
        assert!(with.decision.require_reason);
        assert_eq!(
            with.decision.matched_policy_id.as_deref(),
            Some("time-submit-manager-late")
        );
    }

    #[test]
    fn locked_period_beats_manager_reason() {
        let runtime = seeded_runtime().unwrap();
        let outcome = submit_entry(&runtime, manager(), entry("p-live", day(8, 28)), Some("late"))
            .unwrap();

        let decision = &outcome.decision;
        assert!(decision.is_denied_for(DenyReason::GuardFailed));
        // The first blocked policy is reported: both its failures, in guard order.
        assert_eq!(decision.matched_policy_id.as_deref(), Some("time-submit"));
        let reasons: Vec<_> = decision.guard_failures.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            vec![GuardFailureReason::PeriodLocked, GuardFailureReason::EditWindowExpired]
        );
        assert_eq!(decision.guard_failures[0].details["locked"][0]["lockId"], json!("lock-aug"));
    }

    #[test]
    fn closed_project_is_denied() {
        let runtime = seeded_runtime().unwrap();
        let outcome = submit_entry(&runtime, worker(), entry("p-archived", day(10, 10)), None).unwrap();
        assert_eq!(
            outcome.decision.guard_failures[0].reason,
            GuardFailureReason::ProjectIsClosed
        );
        assert_eq!(
            outcome.decision.guard_failures[0].details["projectIds"],
            json!(["p-archived"])
        );
    }

    #[test]
    fn batch_entry_uses_one_lock_lookup() {
        let runtime = seeded_runtime().unwrap();
        runtime.erp.reset_lookups();

        let batch = permit_contracts::request::EntityState {
            project_ids: vec!["p-live".to_string(), "p-other".to_string()],
            work_dates: vec![day(10, 5), day(10, 12)],
            ..Default::default()
        };
        let outcome = submit_entry(&runtime, worker(), batch, None).unwrap();

        assert!(outcome.allowed());
        assert_eq!(runtime.erp.lookups().period_locks, 1);
    }

    #[test]
    fn scenario_runs() {
        run_scenario().unwrap();
    }
}
