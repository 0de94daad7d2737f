//! # permit-contracts
//!
//! Shared types, schemas, and contracts for the PERMIT approval policy
//! engine.
//!
//! All crates in the workspace import from here. No evaluation logic lives in
//! this crate, only data definitions, small predicates over them, and error
//! types.

pub mod approval;
pub mod config;
pub mod decision;
pub mod error;
pub mod external;
pub mod guard;
pub mod instance;
pub mod policy;
pub mod record;
pub mod request;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use approval::{ApprovalStep, Approver, CompletionMode, StagePolicy};
    use decision::{Decision, DenyReason, FallbackDecision};
    use error::PermitError;
    use external::{LockScope, PeriodLock};
    use guard::{GuardFailure, GuardFailureReason, GuardKind};
    use policy::Policy;
    use request::Actor;

    fn policy(value: serde_json::Value) -> Policy {
        serde_json::from_value(value).unwrap()
    }

    // ── Policy predicates ────────────────────────────────────────────────────

    #[test]
    fn policy_without_subjects_applies_to_everyone() {
        let p = policy(json!({ "id": "p1", "flowType": "invoice", "actionKey": "approve" }));
        assert!(p.is_enabled, "policies default to enabled");
        assert!(p.applies_to(&Actor::new("anyone")));
    }

    #[test]
    fn policy_subject_clauses_are_or_matched() {
        let p = policy(json!({
            "id": "p1",
            "flowType": "invoice",
            "actionKey": "approve",
            "subjects": { "roles": ["finance"], "userIds": ["u-9"] }
        }));

        assert!(p.applies_to(&Actor::new("u-1").with_roles(&["finance"])));
        assert!(p.applies_to(&Actor::new("u-9")));
        assert!(!p.applies_to(&Actor::new("u-2").with_groups(&["finance"])));
    }

    #[test]
    fn policy_status_constraints() {
        let p = policy(json!({
            "id": "p1",
            "flowType": "invoice",
            "actionKey": "approve",
            "stateConstraints": { "statusIn": ["draft", "pending"], "statusNotIn": ["pending"] }
        }));

        assert!(p.admits_status(Some("draft")));
        assert!(!p.admits_status(Some("pending")), "statusNotIn wins over statusIn");
        assert!(!p.admits_status(Some("paid")));
        assert!(!p.admits_status(None), "statusIn requires a status");
    }

    // ── Approval types ───────────────────────────────────────────────────────

    #[test]
    fn approval_step_uses_flat_json_shape() {
        let step = ApprovalStep::new(Approver::group("mgmt"), 1);
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value, json!({ "approverGroupId": "mgmt", "stepOrder": 1 }));

        let parsed: ApprovalStep =
            serde_json::from_value(json!({ "approverUserId": "u-7", "stepOrder": 2 })).unwrap();
        assert_eq!(parsed, ApprovalStep::new(Approver::user("u-7"), 2));
    }

    #[test]
    fn completion_modes() {
        assert!(CompletionMode::All.is_satisfied(3, 3));
        assert!(!CompletionMode::All.is_satisfied(2, 3));
        assert!(CompletionMode::Any.is_satisfied(1, 3));
        assert!(!CompletionMode::Any.is_satisfied(0, 3));
        assert!(CompletionMode::Quorum { quorum: 2 }.is_satisfied(2, 3));
        assert!(!CompletionMode::Quorum { quorum: 2 }.is_satisfied(1, 3));
    }

    #[test]
    fn stage_policy_defaults_to_all() {
        let mut policy = StagePolicy::all_for([1, 2]);
        policy.insert(2, CompletionMode::Any);

        assert_eq!(policy.mode_for(1), CompletionMode::All);
        assert_eq!(policy.mode_for(2), CompletionMode::Any);
        assert_eq!(policy.mode_for(9), CompletionMode::All);
    }

    // ── Decisions ────────────────────────────────────────────────────────────

    #[test]
    fn fallback_decision_flattens_decision_fields() {
        let outcome = FallbackDecision {
            decision: Decision::no_matching_policy(),
            policy_applied: false,
        };
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["allowed"], json!(false));
        assert_eq!(value["reason"], json!("no_matching_policy"));
        assert_eq!(value["policyApplied"], json!(false));
    }

    #[test]
    fn guard_failure_reason_wire_names() {
        let failure = GuardFailure::new("editable_days", GuardFailureReason::WorkDateRequired);
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["type"], json!("editable_days"));
        assert_eq!(value["reason"], json!("workDate_required"));
        assert_eq!(
            serde_json::to_value(GuardFailureReason::EditWindowExpired).unwrap(),
            json!(GuardFailureReason::EditWindowExpired.as_str())
        );
    }

    #[test]
    fn deny_reason_helper() {
        let d = Decision::guard_failed("p1", vec![]);
        assert!(d.is_denied_for(DenyReason::GuardFailed));
        assert!(!d.is_denied_for(DenyReason::ReasonRequired));
        assert!(!Decision::allow("p1", false).is_denied_for(DenyReason::GuardFailed));
    }

    #[test]
    fn guard_kind_parse_keeps_unknown_names() {
        assert_eq!(GuardKind::parse("period_lock"), GuardKind::PeriodLock);
        let unknown = GuardKind::parse("moon_phase");
        assert_eq!(unknown, GuardKind::Unknown("moon_phase".to_string()));
        assert_eq!(unknown.as_str(), "moon_phase");
    }

    // ── Period locks ─────────────────────────────────────────────────────────

    #[test]
    fn period_lock_coverage() {
        let global = PeriodLock {
            id: "l1".to_string(),
            period_key: "2026-09".to_string(),
            scope: LockScope::Global,
        };
        let project = PeriodLock {
            id: "l2".to_string(),
            period_key: "2026-09".to_string(),
            scope: LockScope::Project { project_id: "p-1".to_string() },
        };

        assert!(global.covers("2026-09", None));
        assert!(global.covers("2026-09", Some("p-2")));
        assert!(!global.covers("2026-10", None));
        assert!(project.covers("2026-09", Some("p-1")));
        assert!(!project.covers("2026-09", Some("p-2")));
        assert!(!project.covers("2026-09", None));
    }

    #[test]
    fn period_lock_json_shape() {
        let lock: PeriodLock = serde_json::from_value(json!({
            "id": "l2",
            "periodKey": "2026-09",
            "scope": "project",
            "projectId": "p-1"
        }))
        .unwrap();
        assert_eq!(lock.scope, LockScope::Project { project_id: "p-1".to_string() });
    }

    // ── PermitError display messages ─────────────────────────────────────────

    #[test]
    fn error_store_display() {
        let err = PermitError::store("period_locks", "connection reset");
        let msg = err.to_string();
        assert!(msg.contains("period_locks"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn error_not_an_approver_display() {
        let err = PermitError::NotAnApprover {
            user_id: "u-3".to_string(),
            step_order: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("u-3"));
        assert!(msg.contains("stage 2"));
    }

    #[test]
    fn error_config_display() {
        let err = PermitError::ConfigError {
            reason: "missing policy path".to_string(),
        };
        assert!(err.to_string().contains("configuration error"));
    }
}
