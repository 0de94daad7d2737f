//! ERP demo scenarios.
//!
//! Each scenario builds its own `ErpRuntime`, seeds the in-memory ERP, and
//! walks one enforcement pattern end to end, printing each decision.

pub mod ack_override;
pub mod invoice_approval;
pub mod staged_quorum;
pub mod timesheet_lock;

use chrono::{DateTime, NaiveDate, Utc};

use permit_contracts::decision::FallbackDecision;

/// The moment every scenario runs at: 2026-10-15 12:00 UTC.
pub fn scenario_now() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2026, 10, 15)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// One-line summary of a gate outcome.
pub(crate) fn describe(outcome: &FallbackDecision) -> String {
    let d = &outcome.decision;
    let verdict = match (d.allowed, &d.reason) {
        (true, _) if d.guard_override => "ALLOW (override)".to_string(),
        (true, _) => "ALLOW".to_string(),
        (false, Some(reason)) => format!("DENY ({reason})"),
        (false, None) => "DENY".to_string(),
    };
    let policy = d.matched_policy_id.as_deref().unwrap_or("-");
    let failures: Vec<String> = d
        .guard_failures
        .iter()
        .map(|f| format!("{}:{}", f.guard_type, f.reason))
        .collect();

    if failures.is_empty() {
        format!("{verdict}  policy={policy}  applied={}", outcome.policy_applied)
    } else {
        format!(
            "{verdict}  policy={policy}  applied={}  failures=[{}]",
            outcome.policy_applied,
            failures.join(", ")
        )
    }
}
