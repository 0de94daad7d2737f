//! The wired ERP runtime.
//!
//! ```text
//!   TomlPolicyStore ─┐
//!   GuardEvaluator ──┼─► PolicyMatcher ─► FallbackAdapter ─► ApprovalFlow
//!   FixedClock ──────┘                                          │
//!                                                   InMemoryAuditWriter
//! ```
//!
//! `ErpRuntime` owns one of everything and persists each instance the flow
//! returns back into the in-memory ERP, so `approval_open` sees pending
//! submissions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use permit_audit::InMemoryAuditWriter;
use permit_contracts::{
    approval::{ApprovalRule, PendingStatus},
    config::PermitConfig,
    decision::FallbackDecision,
    error::PermitResult,
    instance::{ApprovalAction, ApprovalInstance},
    request::{Actor, EntityState, EvaluationInput},
};
use permit_core::{
    flow::{ActOutcome, ApprovalFlow, Submission, SubmitOutcome},
    traits::ActionGate,
};
use permit_guard::GuardEvaluator;
use permit_policy::{FallbackAdapter, PolicyMatcher, TomlPolicyStore};
use permit_steps::{ApprovalPlan, ApprovalPlanner, ApprovalRuleMatcher};

use crate::mock_data;
use crate::stores::{FixedClock, InMemoryErp};

/// Policies shipped with the reference runtime.
pub const BUNDLED_POLICIES: &str = include_str!("../policies/erp.toml");

pub struct ErpRuntime {
    pub erp: Arc<InMemoryErp>,
    pub clock: Arc<FixedClock>,
    pub audit: InMemoryAuditWriter,
    gate: Arc<FallbackAdapter>,
    flow: ApprovalFlow,
    planner: ApprovalPlanner,
    rules: Vec<ApprovalRule>,
}

impl ErpRuntime {
    /// Wire a runtime from a policy document and settings.
    pub fn new(policies_toml: &str, config: &PermitConfig, now: DateTime<Utc>) -> PermitResult<Self> {
        let erp = Arc::new(InMemoryErp::new());
        let clock = Arc::new(FixedClock::at(now));
        let audit = InMemoryAuditWriter::new("erp");

        let store = TomlPolicyStore::from_toml_str(policies_toml)?;
        let policy_count = store.policies().len();
        let guards = GuardEvaluator::new(InMemoryErp::guard_stores(&erp), &config.engine)?;
        let matcher = PolicyMatcher::new(Arc::new(store), guards, clock.clone());
        let gate = Arc::new(FallbackAdapter::new(Arc::new(matcher), &config.engine));
        let flow = ApprovalFlow::new(gate.clone(), Arc::new(audit.clone()), clock.clone());
        let planner = ApprovalPlanner::new(ApprovalRuleMatcher::new(config.ladder.clone()));

        info!(policy_count, stream_id = %audit.stream_id(), "ERP runtime ready");

        Ok(Self {
            erp,
            clock,
            audit,
            gate,
            flow,
            planner,
            rules: mock_data::approval_rules(),
        })
    }

    /// A runtime over the bundled policies and default settings.
    pub fn bundled(now: DateTime<Utc>) -> PermitResult<Self> {
        Self::new(BUNDLED_POLICIES, &PermitConfig::default(), now)
    }

    pub fn with_rules(mut self, rules: Vec<ApprovalRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Gate one action without touching any instance.
    pub fn evaluate(&self, input: &EvaluationInput) -> PermitResult<FallbackDecision> {
        self.gate.evaluate_with_fallback(input)
    }

    pub fn plan(&self, flow_type: &str, payload: &Value) -> ApprovalPlan {
        self.planner.plan(flow_type, payload, &self.rules)
    }

    pub fn pending_status(&self, instance: &ApprovalInstance) -> PendingStatus {
        self.planner
            .matcher()
            .resolve_pending_status(&instance.steps, Some(instance.current_step))
    }

    pub fn submit(&self, submission: Submission) -> PermitResult<SubmitOutcome> {
        let outcome = self.flow.submit(submission)?;
        if let SubmitOutcome::Created { instance, .. } = &outcome {
            self.erp.save_instance(instance);
        }
        Ok(outcome)
    }

    pub fn act(
        &self,
        instance: ApprovalInstance,
        action: ApprovalAction,
        actor: &Actor,
        state: EntityState,
        reason_text: Option<String>,
    ) -> PermitResult<ActOutcome> {
        let outcome = self.flow.act(instance, action, actor, state, reason_text)?;
        match &outcome {
            ActOutcome::Advanced { instance, .. } | ActOutcome::Finished { instance, .. } => {
                self.erp.save_instance(instance);
            }
            ActOutcome::Denied { .. } => {}
        }
        Ok(outcome)
    }
}
