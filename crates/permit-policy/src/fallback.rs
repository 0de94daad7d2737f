//! Legacy-compatible gate over the policy matcher.
//!
//! Callers that predate explicit policies expect an unconfigured action to
//! be allowed. `FallbackAdapter` keeps that behaviour and adds the elevated
//! override for acknowledgement guards:
//!
//! | matcher result                              | gate result                       |
//! |---------------------------------------------|-----------------------------------|
//! | allowed                                     | allowed, policy applied           |
//! | `no_matching_policy`                        | allowed, policy not applied       |
//! | `guard_failed`, only ack failures, elevated | override (reason required)        |
//! | anything else                               | unchanged, policy applied         |

use std::sync::Arc;

use tracing::{debug, info};

use permit_contracts::{
    config::EngineSettings,
    decision::{Decision, DenyReason, FallbackDecision},
    error::PermitResult,
    guard::GuardKind,
    request::EvaluationInput,
};
use permit_core::traits::{ActionGate, PolicyEvaluator};

pub struct FallbackAdapter {
    evaluator: Arc<dyn PolicyEvaluator>,
    elevated_roles: Vec<String>,
}

impl FallbackAdapter {
    pub fn new(evaluator: Arc<dyn PolicyEvaluator>, settings: &EngineSettings) -> Self {
        Self {
            evaluator,
            elevated_roles: settings.elevated_roles.clone(),
        }
    }

    fn is_elevated(&self, input: &EvaluationInput) -> bool {
        self.elevated_roles.iter().any(|r| input.actor.has_role(r))
    }

    /// True when the decision failed only on acknowledgement guards.
    fn only_ack_failures(decision: &Decision) -> bool {
        !decision.guard_failures.is_empty()
            && decision
                .guard_failures
                .iter()
                .all(|f| f.is_kind(&GuardKind::ChatAckCompleted))
    }
}

impl ActionGate for FallbackAdapter {
    fn evaluate_with_fallback(&self, input: &EvaluationInput) -> PermitResult<FallbackDecision> {
        let decision = self.evaluator.evaluate(input)?;

        if decision.allowed {
            return Ok(FallbackDecision {
                decision,
                policy_applied: true,
            });
        }

        if decision.is_denied_for(DenyReason::NoMatchingPolicy) {
            debug!(
                flow_type = %input.flow_type,
                action = %input.action_key,
                "no policy configured; allowing under legacy rules"
            );
            return Ok(FallbackDecision {
                decision: Decision {
                    allowed: true,
                    reason: None,
                    ..decision
                },
                policy_applied: false,
            });
        }

        let overridable = decision.is_denied_for(DenyReason::GuardFailed)
            && Self::only_ack_failures(&decision)
            && self.is_elevated(input);

        if !overridable {
            return Ok(FallbackDecision {
                decision,
                policy_applied: true,
            });
        }

        if !input.has_reason() {
            debug!(
                user_id = %input.actor.user_id,
                policy_id = ?decision.matched_policy_id,
                "ack override available but no reason given"
            );
            return Ok(FallbackDecision {
                decision: Decision {
                    reason: Some(DenyReason::ReasonRequired),
                    require_reason: true,
                    ..decision
                },
                policy_applied: true,
            });
        }

        info!(
            user_id = %input.actor.user_id,
            flow_type = %input.flow_type,
            action = %input.action_key,
            policy_id = ?decision.matched_policy_id,
            "ack guard overridden by elevated actor"
        );

        Ok(FallbackDecision {
            decision: Decision {
                allowed: true,
                reason: None,
                require_reason: true,
                guard_override: true,
                ..decision
            },
            policy_applied: true,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use permit_contracts::{
        config::EngineSettings,
        decision::{Decision, DenyReason},
        error::PermitResult,
        guard::{GuardFailure, GuardFailureReason},
        request::{Actor, EvaluationInput},
    };
    use permit_core::traits::{ActionGate, PolicyEvaluator};

    use super::FallbackAdapter;

    /// Returns a fixed decision for every input.
    struct Fixed(Decision);

    impl PolicyEvaluator for Fixed {
        fn evaluate(&self, _: &EvaluationInput) -> PermitResult<Decision> {
            Ok(self.0.clone())
        }
    }

    fn adapter(decision: Decision) -> FallbackAdapter {
        FallbackAdapter::new(Arc::new(Fixed(decision)), &EngineSettings::default())
    }

    fn input(actor: Actor) -> EvaluationInput {
        EvaluationInput::new("invoice", "approve", actor)
    }

    fn ack_failure() -> GuardFailure {
        GuardFailure::new("chat_ack_completed", GuardFailureReason::Incomplete)
    }

    fn admin() -> Actor {
        Actor::new("admin-1").with_roles(&["admin"])
    }

    #[test]
    fn test_allowed_passes_through() {
        let outcome = adapter(Decision::allow("p-1", false))
            .evaluate_with_fallback(&input(Actor::new("u-1")))
            .unwrap();
        assert!(outcome.allowed());
        assert!(outcome.policy_applied);
        assert_eq!(outcome.decision.matched_policy_id.as_deref(), Some("p-1"));
    }

    #[test]
    fn test_no_matching_policy_is_legacy_allow() {
        let outcome = adapter(Decision::no_matching_policy())
            .evaluate_with_fallback(&input(Actor::new("u-1")))
            .unwrap();
        assert!(outcome.allowed());
        assert!(!outcome.policy_applied);
        assert_eq!(outcome.decision.reason, None);
    }

    #[test]
    fn test_elevated_override_requires_reason() {
        let outcome = adapter(Decision::guard_failed("p-ack", vec![ack_failure()]))
            .evaluate_with_fallback(&input(admin()))
            .unwrap();

        assert!(!outcome.allowed());
        assert!(outcome.decision.is_denied_for(DenyReason::ReasonRequired));
        assert!(outcome.decision.require_reason);
        assert_eq!(outcome.decision.matched_policy_id.as_deref(), Some("p-ack"));
        assert!(!outcome.decision.guard_override);
    }

    #[test]
    fn test_elevated_override_with_reason() {
        let outcome = adapter(Decision::guard_failed("p-ack", vec![ack_failure()]))
            .evaluate_with_fallback(&input(admin()).with_reason("customer confirmed by phone"))
            .unwrap();

        assert!(outcome.allowed());
        assert!(outcome.policy_applied);
        assert!(outcome.decision.guard_override);
        assert!(outcome.decision.require_reason);
        assert_eq!(outcome.decision.reason, None);
        assert_eq!(outcome.decision.guard_failures.len(), 1, "failures kept for the audit record");
    }

    #[test]
    fn test_non_elevated_actor_cannot_override() {
        let outcome = adapter(Decision::guard_failed("p-ack", vec![ack_failure()]))
            .evaluate_with_fallback(&input(Actor::new("u-1")).with_reason("please"))
            .unwrap();
        assert!(outcome.decision.is_denied_for(DenyReason::GuardFailed));
        assert!(outcome.policy_applied);
    }

    #[test]
    fn test_mixed_failures_cannot_be_overridden() {
        let failures = vec![
            ack_failure(),
            GuardFailure::new("period_lock", GuardFailureReason::PeriodLocked),
        ];
        let outcome = adapter(Decision::guard_failed("p-ack", failures))
            .evaluate_with_fallback(&input(admin()).with_reason("month end"))
            .unwrap();
        assert!(outcome.decision.is_denied_for(DenyReason::GuardFailed));
        assert!(!outcome.decision.guard_override);
    }

    #[test]
    fn test_empty_failure_list_cannot_be_overridden() {
        let outcome = adapter(Decision::guard_failed("p-ack", vec![]))
            .evaluate_with_fallback(&input(admin()).with_reason("month end"))
            .unwrap();
        assert!(!outcome.allowed());
    }

    #[test]
    fn test_elevated_roles_are_configurable() {
        let settings = EngineSettings {
            elevated_roles: vec!["controller".to_string()],
            ..EngineSettings::default()
        };
        let adapter = FallbackAdapter::new(
            Arc::new(Fixed(Decision::guard_failed("p-ack", vec![ack_failure()]))),
            &settings,
        );

        let admin_outcome = adapter
            .evaluate_with_fallback(&input(admin()).with_reason("x"))
            .unwrap();
        assert!(!admin_outcome.allowed());

        let controller = Actor::new("c-1").with_roles(&["controller"]);
        let controller_outcome = adapter
            .evaluate_with_fallback(&input(controller).with_reason("x"))
            .unwrap();
        assert!(controller_outcome.decision.guard_override);
    }

    #[test]
    fn test_reason_required_denial_passes_through() {
        let outcome = adapter(Decision::reason_required(Some("p-2".to_string())))
            .evaluate_with_fallback(&input(admin()))
            .unwrap();
        assert!(outcome.decision.is_denied_for(DenyReason::ReasonRequired));
        assert!(outcome.policy_applied);
    }
}
