//! Amount-driven default ladders and rule condition matching.
//!
//! When an approval rule has no usable step definition, the ladder is
//! derived from the document amount:
//!
//! ```text
//!   amount < skipUnder                          → [mgmt@1]
//!   recurring and amount < execThreshold        → [mgmt@1]
//!   amount < execThreshold                      → [mgmt@1]
//!   otherwise                                   → [mgmt@1, exec@2]
//! ```

use serde_json::Value;
use tracing::debug;

use permit_contracts::{
    approval::{ApprovalStep, Approver, PendingStatus, RuleCondition},
    config::LadderSettings,
};

/// Builds default ladders and pending labels from the configured groups and
/// thresholds.
#[derive(Debug, Clone, Default)]
pub struct ApprovalRuleMatcher {
    ladder: LadderSettings,
}

impl ApprovalRuleMatcher {
    pub fn new(ladder: LadderSettings) -> Self {
        Self { ladder }
    }

    pub fn settings(&self) -> &LadderSettings {
        &self.ladder
    }

    /// The default step chain for a `flow_type` document with `payload`
    /// under `condition`.
    ///
    /// Thresholds come from the condition when set, else from the ladder
    /// settings. The chain shape is the same for every flow type.
    pub fn match_approval_steps(
        &self,
        flow_type: &str,
        payload: &Value,
        condition: &RuleCondition,
    ) -> Vec<ApprovalStep> {
        let amount = payload_amount(payload);
        let recurring = payload_is_recurring(payload);
        let skip_under = condition.skip_under.unwrap_or(self.ladder.skip_under);
        let exec_threshold = condition.exec_threshold.unwrap_or(self.ladder.exec_threshold);

        let mgmt = ApprovalStep::new(Approver::group(self.ladder.mgmt_group_id.clone()), 1);

        let steps = if amount < skip_under || (recurring && amount < exec_threshold) {
            vec![mgmt]
        } else if amount >= exec_threshold {
            vec![
                mgmt,
                ApprovalStep::new(Approver::group(self.ladder.exec_group_id.clone()), 2),
            ]
        } else {
            vec![mgmt]
        };

        debug!(
            flow_type,
            amount,
            recurring,
            skip_under,
            exec_threshold,
            stage_count = steps.len(),
            "default approval chain"
        );
        steps
    }

    /// Label for an instance waiting at `current_step_order`.
    ///
    /// `pending_exec` when a step at that order belongs to the exec group,
    /// `pending_qa` otherwise, including when there is no current order.
    pub fn resolve_pending_status(
        &self,
        steps: &[ApprovalStep],
        current_step_order: Option<u32>,
    ) -> PendingStatus {
        let order = match current_step_order {
            None | Some(0) => return PendingStatus::PendingQa,
            Some(order) => order,
        };

        let at_exec = steps.iter().any(|s| {
            s.step_order == order && s.approver.group_id() == Some(self.ladder.exec_group_id.as_str())
        });

        if at_exec {
            PendingStatus::PendingExec
        } else {
            PendingStatus::PendingQa
        }
    }
}

/// Payload predicates for `RuleCondition`.
pub trait ConditionMatch {
    /// True when `flow_type` and `payload` satisfy every set clause.
    fn matches(&self, flow_type: &str, payload: &Value) -> bool;
}

impl ConditionMatch for RuleCondition {
    fn matches(&self, flow_type: &str, payload: &Value) -> bool {
        if !self.flow_types.is_empty() && !self.flow_types.iter().any(|f| f == flow_type) {
            return false;
        }

        let amount = payload_amount(payload);
        if self.min_amount.is_some_and(|min| amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| amount >= max) {
            return false;
        }

        match self.is_recurring {
            Some(expected) => payload_is_recurring(payload) == expected,
            None => true,
        }
    }
}

/// The document amount: `totalAmount`, else `amount`.
///
/// Numbers and numeric strings are accepted; anything else, or a value that
/// is not finite, counts as 0.
pub fn payload_amount(payload: &Value) -> f64 {
    let raw = match payload.get("totalAmount") {
        Some(v) if !v.is_null() => Some(v),
        _ => payload.get("amount"),
    };

    let amount = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    amount.filter(|a| a.is_finite()).unwrap_or(0.0)
}

/// True only when `isRecurring` is the boolean `true`.
pub fn payload_is_recurring(payload: &Value) -> bool {
    payload.get("isRecurring").and_then(Value::as_bool) == Some(true)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use permit_contracts::{
        approval::{ApprovalStep, Approver, PendingStatus, RuleCondition},
        config::LadderSettings,
    };

    use super::{payload_amount, ApprovalRuleMatcher, ConditionMatch};

    fn matcher() -> ApprovalRuleMatcher {
        ApprovalRuleMatcher::new(LadderSettings::default())
    }

    fn mgmt() -> ApprovalStep {
        ApprovalStep::new(Approver::group("mgmt"), 1)
    }

    fn exec() -> ApprovalStep {
        ApprovalStep::new(Approver::group("exec"), 2)
    }

    fn condition(skip_under: f64, exec_threshold: f64) -> RuleCondition {
        RuleCondition {
            skip_under: Some(skip_under),
            exec_threshold: Some(exec_threshold),
            ..RuleCondition::default()
        }
    }

    // ── Default chain ─────────────────────────────────────────────────────────

    #[test]
    fn test_small_invoice_gets_single_stage() {
        let steps = matcher().match_approval_steps(
            "invoice",
            &json!({ "amount": 40_000 }),
            &RuleCondition { skip_under: Some(50_000.0), ..RuleCondition::default() },
        );
        assert_eq!(steps, vec![mgmt()]);
    }

    #[test]
    fn test_large_invoice_adds_exec_stage() {
        let steps = matcher().match_approval_steps(
            "invoice",
            &json!({ "amount": 120_000, "isRecurring": false }),
            &RuleCondition { exec_threshold: Some(100_000.0), ..RuleCondition::default() },
        );
        assert_eq!(steps, vec![mgmt(), exec()]);
    }

    #[test]
    fn test_threshold_boundaries() {
        let m = matcher();
        let c = condition(50_000.0, 100_000.0);

        assert_eq!(m.match_approval_steps("invoice", &json!({ "amount": 49_999.99 }), &c), vec![mgmt()]);
        assert_eq!(m.match_approval_steps("invoice", &json!({ "amount": 50_000 }), &c), vec![mgmt()]);
        assert_eq!(m.match_approval_steps("invoice", &json!({ "amount": 99_999 }), &c), vec![mgmt()]);
        assert_eq!(
            m.match_approval_steps("invoice", &json!({ "amount": 100_000 }), &c),
            vec![mgmt(), exec()]
        );
    }

    #[test]
    fn test_recurring_below_exec_threshold_is_single_stage() {
        let m = matcher();
        let c = condition(10_000.0, 100_000.0);

        assert_eq!(
            m.match_approval_steps("invoice", &json!({ "amount": 80_000, "isRecurring": true }), &c),
            vec![mgmt()]
        );
        assert_eq!(
            m.match_approval_steps("invoice", &json!({ "amount": 150_000, "isRecurring": true }), &c),
            vec![mgmt(), exec()]
        );
    }

    #[test]
    fn test_defaults_apply_without_condition_thresholds() {
        let m = matcher();
        let empty = RuleCondition::default();
        assert_eq!(m.match_approval_steps("invoice", &json!({ "amount": 49_000 }), &empty), vec![mgmt()]);
        assert_eq!(
            m.match_approval_steps("invoice", &json!({ "totalAmount": "250000" }), &empty),
            vec![mgmt(), exec()]
        );
    }

    #[test]
    fn test_configured_group_ids() {
        let m = ApprovalRuleMatcher::new(LadderSettings {
            mgmt_group_id: "managers".to_string(),
            exec_group_id: "board".to_string(),
            ..LadderSettings::default()
        });
        let steps =
            m.match_approval_steps("invoice", &json!({ "amount": 500_000 }), &RuleCondition::default());
        assert_eq!(steps[0].approver, Approver::group("managers"));
        assert_eq!(steps[1].approver, Approver::group("board"));
    }

    #[test]
    fn test_chain_shape_does_not_depend_on_flow_type() {
        let m = matcher();
        let c = condition(50_000.0, 100_000.0);
        let payload = json!({ "amount": 120_000 });

        let invoice = m.match_approval_steps("invoice", &payload, &c);
        assert_eq!(m.match_approval_steps("expense", &payload, &c), invoice);
        assert_eq!(invoice, vec![mgmt(), exec()]);
    }

    // ── Amount coercion ───────────────────────────────────────────────────────

    #[test]
    fn test_amount_coercion() {
        assert_eq!(payload_amount(&json!({ "totalAmount": 10, "amount": 99 })), 10.0);
        assert_eq!(payload_amount(&json!({ "totalAmount": null, "amount": 99 })), 99.0);
        assert_eq!(payload_amount(&json!({ "amount": " 1250.5 " })), 1250.5);
        assert_eq!(payload_amount(&json!({ "amount": "abc" })), 0.0);
        assert_eq!(payload_amount(&json!({ "amount": "inf" })), 0.0);
        assert_eq!(payload_amount(&json!({ "amount": true })), 0.0);
        assert_eq!(payload_amount(&json!({})), 0.0);
    }

    // ── Pending status ────────────────────────────────────────────────────────

    #[test]
    fn test_resolve_pending_status() {
        let m = matcher();
        let steps = vec![ApprovalStep::new(Approver::group("exec"), 2)];

        assert_eq!(m.resolve_pending_status(&steps, Some(2)), PendingStatus::PendingExec);
        assert_eq!(m.resolve_pending_status(&steps, None), PendingStatus::PendingQa);
        assert_eq!(m.resolve_pending_status(&steps, Some(0)), PendingStatus::PendingQa);
        assert_eq!(m.resolve_pending_status(&steps, Some(1)), PendingStatus::PendingQa);
        assert_eq!(PendingStatus::PendingExec.as_str(), "pending_exec");
    }

    #[test]
    fn test_user_step_at_exec_order_is_qa() {
        let steps = vec![ApprovalStep::new(Approver::user("exec"), 2)];
        assert_eq!(matcher().resolve_pending_status(&steps, Some(2)), PendingStatus::PendingQa);
    }

    // ── Condition matching ────────────────────────────────────────────────────

    #[test]
    fn test_condition_bounds() {
        let c = RuleCondition {
            flow_types: vec!["invoice".to_string()],
            min_amount: Some(1_000.0),
            max_amount: Some(5_000.0),
            ..RuleCondition::default()
        };

        assert!(c.matches("invoice", &json!({ "amount": 1_000 })), "min is inclusive");
        assert!(c.matches("invoice", &json!({ "amount": 4_999.99 })));
        assert!(!c.matches("invoice", &json!({ "amount": 5_000 })), "max is exclusive");
        assert!(!c.matches("invoice", &json!({ "amount": 999 })));
        assert!(!c.matches("expense", &json!({ "amount": 2_000 })));
    }

    #[test]
    fn test_condition_recurring_flag() {
        let c = RuleCondition {
            is_recurring: Some(false),
            ..RuleCondition::default()
        };
        assert!(c.matches("invoice", &json!({})));
        assert!(c.matches("invoice", &json!({ "isRecurring": "true" })), "only boolean true counts");
        assert!(!c.matches("invoice", &json!({ "isRecurring": true })));
    }
}
