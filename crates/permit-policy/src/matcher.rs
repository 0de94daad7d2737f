//! Priority-ordered policy matcher.
//!
//! `PolicyMatcher` implements the `PolicyEvaluator` trait from `permit-core`.
//!
//! Evaluation algorithm:
//!
//! 1. Load enabled policies for (flow type, action key), then re-filter and
//!    stable-sort them by priority descending, creation time descending.
//! 2. Skip any policy whose state constraints or subjects do not match.
//! 3. For the first policy that does match, run its guards:
//!    a. Guards pass, reason required but missing → `reason_required`
//!       (terminal).
//!    b. Guards pass → allow.
//!    c. Guards fail → remember the first such policy and keep scanning.
//! 4. Nothing allowed → `guard_failed` for the remembered policy, otherwise
//!    `no_matching_policy`.

use std::sync::Arc;

use tracing::{debug, warn};

use permit_contracts::{
    decision::Decision,
    error::PermitResult,
    guard::GuardFailure,
    policy::Policy,
    request::EvaluationInput,
};
use permit_core::traits::{Clock, PolicyEvaluator, PolicyStore};
use permit_guard::GuardEvaluator;

/// What visiting one candidate policy produced.
enum Visit {
    /// Constraints or subjects did not match.
    Skipped,
    /// The scan ends with this decision.
    Terminal(Decision),
    /// Matched, but at least one guard failed.
    Blocked(Vec<GuardFailure>),
}

/// The PERMIT policy matcher.
pub struct PolicyMatcher {
    store: Arc<dyn PolicyStore>,
    guards: GuardEvaluator,
    clock: Arc<dyn Clock>,
}

impl PolicyMatcher {
    pub fn new(store: Arc<dyn PolicyStore>, guards: GuardEvaluator, clock: Arc<dyn Clock>) -> Self {
        Self { store, guards, clock }
    }

    fn visit(
        &self,
        policy: &Policy,
        input: &EvaluationInput,
        now: chrono::DateTime<chrono::Utc>,
    ) -> PermitResult<Visit> {
        if !policy.admits_status(input.state.status.as_deref()) {
            debug!(policy_id = %policy.id, status = ?input.state.status, "state constraints not met");
            return Ok(Visit::Skipped);
        }
        if !policy.applies_to(&input.actor) {
            debug!(policy_id = %policy.id, user_id = %input.actor.user_id, "subjects not met");
            return Ok(Visit::Skipped);
        }

        debug!(policy_id = %policy.id, priority = policy.priority, "policy matched");

        let failures = self.guards.evaluate(&policy.guards, input, now)?;
        if !failures.is_empty() {
            return Ok(Visit::Blocked(failures));
        }

        if policy.require_reason && !input.has_reason() {
            return Ok(Visit::Terminal(Decision::reason_required(Some(policy.id.clone()))));
        }

        Ok(Visit::Terminal(Decision::allow(policy.id.clone(), policy.require_reason)))
    }
}

impl PolicyEvaluator for PolicyMatcher {
    fn evaluate(&self, input: &EvaluationInput) -> PermitResult<Decision> {
        debug!(
            flow_type = %input.flow_type,
            action = %input.action_key,
            user_id = %input.actor.user_id,
            "evaluating policies"
        );

        let now = self.clock.now();

        let mut candidates: Vec<Policy> = self
            .store
            .list_enabled(&input.flow_type, &input.action_key)?
            .into_iter()
            .filter(|p| {
                p.is_enabled && p.flow_type == input.flow_type && p.action_key == input.action_key
            })
            .collect();
        sort_for_scan(&mut candidates);

        let mut blocked: Option<(String, Vec<GuardFailure>)> = None;

        for policy in &candidates {
            match self.visit(policy, input, now)? {
                Visit::Skipped => continue,
                Visit::Terminal(decision) => {
                    debug!(
                        policy_id = %policy.id,
                        allowed = decision.allowed,
                        reason = ?decision.reason,
                        "policy decided"
                    );
                    return Ok(decision);
                }
                Visit::Blocked(failures) => {
                    debug!(
                        policy_id = %policy.id,
                        failure_count = failures.len(),
                        "policy blocked by guards; trying lower priority"
                    );
                    if blocked.is_none() {
                        blocked = Some((policy.id.clone(), failures));
                    }
                }
            }
        }

        match blocked {
            Some((policy_id, failures)) => {
                warn!(
                    flow_type = %input.flow_type,
                    action = %input.action_key,
                    policy_id = %policy_id,
                    "every matching policy was blocked by guards"
                );
                Ok(Decision::guard_failed(policy_id, failures))
            }
            None => {
                debug!(
                    flow_type = %input.flow_type,
                    action = %input.action_key,
                    "no policy matched"
                );
                Ok(Decision::no_matching_policy())
            }
        }
    }
}

/// Stable sort into scan order: priority descending, then newest first.
pub fn sort_for_scan(policies: &mut [Policy]) {
    policies.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use permit_contracts::{
        decision::DenyReason,
        error::PermitResult,
        external::PeriodLock,
        guard::GuardFailureReason,
        policy::Policy,
        request::{Actor, EntityState, EvaluationInput, TargetRef},
    };
    use permit_core::traits::{PeriodLockStore, PolicyEvaluator, PolicyStore};

    use crate::test_support::{fixed_clock, guard_evaluator, guard_evaluator_with_locks};
    use crate::TomlPolicyStore;

    use super::PolicyMatcher;

    fn matcher(toml: &str) -> PolicyMatcher {
        let store = TomlPolicyStore::from_toml_str(toml).unwrap();
        PolicyMatcher::new(Arc::new(store), guard_evaluator(), fixed_clock())
    }

    fn approve(actor: Actor) -> EvaluationInput {
        EvaluationInput::new("invoice", "approve", actor)
            .with_state(EntityState::with_status("pending"))
            .with_target(TargetRef::new("invoices", "inv-1"))
    }

    // ── Outcomes ──────────────────────────────────────────────────────────────

    #[test]
    fn test_no_policies_is_no_matching_policy() {
        let decision = matcher("").evaluate(&approve(Actor::new("u-1"))).unwrap();
        assert!(decision.is_denied_for(DenyReason::NoMatchingPolicy));
        assert_eq!(decision.matched_policy_id, None);
    }

    #[test]
    fn test_first_matching_policy_allows() {
        let toml = r#"
            [[policies]]
            id = "finance"
            flowType = "invoice"
            actionKey = "approve"
            priority = 10
            subjects = { roles = ["finance"] }

            [[policies]]
            id = "everyone"
            flowType = "invoice"
            actionKey = "approve"
            priority = 1
            requireReason = true
        "#;
        let m = matcher(toml);

        let finance = m.evaluate(&approve(Actor::new("u-1").with_roles(&["finance"]))).unwrap();
        assert!(finance.allowed);
        assert_eq!(finance.matched_policy_id.as_deref(), Some("finance"));
        assert!(!finance.require_reason);

        let other = m.evaluate(&approve(Actor::new("u-2")).with_reason("month end")).unwrap();
        assert!(other.allowed);
        assert_eq!(other.matched_policy_id.as_deref(), Some("everyone"));
        assert!(other.require_reason);
    }

    /// Period locks that count how often they are looked up.
    struct CountingLocks(AtomicUsize);

    impl PeriodLockStore for CountingLocks {
        fn find_active(&self, _: &[String], _: &[String]) -> PermitResult<Vec<PeriodLock>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[test]
    fn test_lower_priority_guards_never_run_once_a_policy_allows() {
        let toml = r#"
            [[policies]]
            id = "managers"
            flowType = "time"
            actionKey = "submit"
            priority = 10
            subjects = { roles = ["manager"] }

            [[policies]]
            id = "locked-periods"
            flowType = "time"
            actionKey = "submit"
            priority = 1
            guards = [{ type = "period_lock" }]
        "#;
        let locks = Arc::new(CountingLocks(AtomicUsize::new(0)));
        let store = TomlPolicyStore::from_toml_str(toml).unwrap();
        let m = PolicyMatcher::new(
            Arc::new(store),
            guard_evaluator_with_locks(locks.clone()),
            fixed_clock(),
        );
        let entry = EntityState {
            project_id: Some("p-1".to_string()),
            work_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 10),
            ..EntityState::default()
        };

        let manager = Actor::new("u-1").with_roles(&["manager"]);
        let decision = m
            .evaluate(&EvaluationInput::new("time", "submit", manager).with_state(entry.clone()))
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.matched_policy_id.as_deref(), Some("managers"));
        assert_eq!(locks.0.load(Ordering::SeqCst), 0);

        let worker = Actor::new("u-2").with_roles(&["staff"]);
        let decision = m
            .evaluate(&EvaluationInput::new("time", "submit", worker).with_state(entry))
            .unwrap();
        assert_eq!(decision.matched_policy_id.as_deref(), Some("locked-periods"));
        assert_eq!(locks.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_constraints_skip_policy() {
        let toml = r#"
            [[policies]]
            id = "drafts-only"
            flowType = "invoice"
            actionKey = "approve"
            stateConstraints = { statusIn = ["draft"] }
        "#;
        let decision = matcher(toml).evaluate(&approve(Actor::new("u-1"))).unwrap();
        assert!(decision.is_denied_for(DenyReason::NoMatchingPolicy));
    }

    #[test]
    fn test_missing_reason_is_terminal() {
        let toml = r#"
            [[policies]]
            id = "needs-reason"
            flowType = "invoice"
            actionKey = "approve"
            priority = 10
            requireReason = true

            [[policies]]
            id = "fallback-allow"
            flowType = "invoice"
            actionKey = "approve"
            priority = 1
        "#;
        let decision = matcher(toml)
            .evaluate(&approve(Actor::new("u-1")).with_reason("   "))
            .unwrap();

        assert!(decision.is_denied_for(DenyReason::ReasonRequired));
        assert_eq!(decision.matched_policy_id.as_deref(), Some("needs-reason"));
        assert!(decision.require_reason);
    }

    #[test]
    fn test_blocked_policy_falls_through_to_lower_priority() {
        let toml = r#"
            [[policies]]
            id = "strict"
            flowType = "invoice"
            actionKey = "approve"
            priority = 10
            guards = [{ type = "project_closed" }]

            [[policies]]
            id = "lenient"
            flowType = "invoice"
            actionKey = "approve"
            priority = 1
        "#;
        let decision = matcher(toml).evaluate(&approve(Actor::new("u-1"))).unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.matched_policy_id.as_deref(), Some("lenient"));
    }

    #[test]
    fn test_first_blocked_policy_is_reported() {
        let toml = r#"
            [[policies]]
            id = "first"
            flowType = "invoice"
            actionKey = "approve"
            priority = 10
            guards = [{ type = "project_closed" }]

            [[policies]]
            id = "second"
            flowType = "invoice"
            actionKey = "approve"
            priority = 1
            guards = [{ type = "moon_phase" }]
        "#;
        let decision = matcher(toml).evaluate(&approve(Actor::new("u-1"))).unwrap();

        assert!(decision.is_denied_for(DenyReason::GuardFailed));
        assert_eq!(decision.matched_policy_id.as_deref(), Some("first"));
        assert_eq!(decision.guard_failures.len(), 1);
        assert_eq!(decision.guard_failures[0].reason, GuardFailureReason::ProjectRequired);
    }

    #[test]
    fn test_reason_check_follows_guards() {
        let toml = r#"
            [[policies]]
            id = "guarded"
            flowType = "invoice"
            actionKey = "approve"
            requireReason = true
            guards = [{ type = "project_closed" }]
        "#;
        let decision = matcher(toml).evaluate(&approve(Actor::new("u-1"))).unwrap();
        assert!(
            decision.is_denied_for(DenyReason::GuardFailed),
            "failing guards are reported before a missing reason"
        );
    }

    // ── Ordering ──────────────────────────────────────────────────────────────

    /// A store that ignores its arguments and returns rows as given.
    struct CarelessStore(Vec<Policy>);

    impl PolicyStore for CarelessStore {
        fn list_enabled(&self, _: &str, _: &str) -> PermitResult<Vec<Policy>> {
            Ok(self.0.clone())
        }
    }

    fn policy(value: serde_json::Value) -> Policy {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_matcher_reorders_and_refilters_store_rows() {
        let rows = vec![
            policy(json!({ "id": "low", "flowType": "invoice", "actionKey": "approve", "priority": 1 })),
            policy(json!({
                "id": "disabled", "flowType": "invoice", "actionKey": "approve",
                "priority": 50, "isEnabled": false
            })),
            policy(json!({ "id": "wrong-action", "flowType": "invoice", "actionKey": "submit", "priority": 40 })),
            policy(json!({
                "id": "older", "flowType": "invoice", "actionKey": "approve",
                "priority": 9, "createdAt": "2026-01-01T00:00:00Z"
            })),
            policy(json!({
                "id": "newer", "flowType": "invoice", "actionKey": "approve",
                "priority": 9, "createdAt": "2026-02-01T00:00:00Z"
            })),
        ];
        let m = PolicyMatcher::new(Arc::new(CarelessStore(rows)), guard_evaluator(), fixed_clock());

        let decision = m.evaluate(&approve(Actor::new("u-1"))).unwrap();
        assert_eq!(decision.matched_policy_id.as_deref(), Some("newer"));
    }
}
