//! Ladder selection at submission time.
//!
//! `ApprovalPlanner::plan()` picks the approval rule for a submitted
//! document and turns it into a ladder:
//!
//! 1. Consider enabled rules for the flow type, highest priority first,
//!    newest first among equals.
//! 2. The first rule whose condition matches the payload is selected.
//! 3. If its step definition normalizes, that ladder is used. Otherwise, or
//!    when nothing matched, the amount-driven default chain is used.

use serde_json::Value;
use tracing::{debug, info};

use permit_contracts::approval::{ApprovalRule, NormalizedSteps, RuleCondition, StagePolicy};

use crate::resolver::normalize_rule_steps_with_policy;
use crate::rules::{ApprovalRuleMatcher, ConditionMatch};

/// The ladder chosen for one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalPlan {
    /// The selected rule, if any matched.
    pub rule_id: Option<String>,
    pub ladder: NormalizedSteps,
    /// True when the ladder came from the default chain.
    pub used_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ApprovalPlanner {
    matcher: ApprovalRuleMatcher,
}

impl ApprovalPlanner {
    pub fn new(matcher: ApprovalRuleMatcher) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &ApprovalRuleMatcher {
        &self.matcher
    }

    pub fn plan(&self, flow_type: &str, payload: &Value, rules: &[ApprovalRule]) -> ApprovalPlan {
        let mut candidates: Vec<&ApprovalRule> = rules
            .iter()
            .filter(|r| r.is_enabled && r.flow_type == flow_type)
            .collect();
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        let selected = candidates
            .into_iter()
            .find(|r| r.condition.matches(flow_type, payload));

        if let Some(rule) = selected {
            if let Some(ladder) = normalize_rule_steps_with_policy(&rule.steps) {
                info!(
                    flow_type,
                    rule_id = %rule.id,
                    stage_count = ladder.orders().len(),
                    "approval rule selected"
                );
                return ApprovalPlan {
                    rule_id: Some(rule.id.clone()),
                    ladder,
                    used_default: false,
                };
            }
            debug!(rule_id = %rule.id, "rule steps unusable; using default chain");
        } else {
            debug!(flow_type, "no approval rule matched; using default chain");
        }

        let default_condition = RuleCondition::default();
        let condition = selected.map(|r| &r.condition).unwrap_or(&default_condition);
        let steps = self.matcher.match_approval_steps(flow_type, payload, condition);
        let stage_policy = StagePolicy::all_for(steps.iter().map(|s| s.step_order));

        ApprovalPlan {
            rule_id: selected.map(|r| r.id.clone()),
            ladder: NormalizedSteps { steps, stage_policy },
            used_default: true,
        }
    }
}
