//! # permit-steps
//!
//! Approval ladders for the PERMIT engine.
//!
//! - [`resolver`] normalizes stored step definitions (flat list or staged)
//!   into `NormalizedSteps`.
//! - [`rules`] derives the amount-driven default chain, matches rule
//!   conditions and labels pending instances.
//! - [`planner`] selects the rule for a submission and produces its ladder.

pub mod planner;
pub mod resolver;
pub mod rules;

pub use planner::{ApprovalPlan, ApprovalPlanner};
pub use resolver::{normalize_rule_steps_with_policy, StepDefinitionError};
pub use rules::{ApprovalRuleMatcher, ConditionMatch};
