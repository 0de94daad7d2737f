//! Seed data for the ERP reference runtime.
//!
//! Approval rules as an administrator would configure them, plus the
//! users that appear in the scenarios.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use permit_contracts::{
    approval::{ApprovalRule, RuleCondition},
    request::Actor,
};

/// Approval rules for every flow the scenarios use.
pub fn approval_rules() -> Vec<ApprovalRule> {
    vec![
        // Invoices use the amount-driven default chain.
        ApprovalRule {
            id: "invoice-default".to_string(),
            flow_type: "invoice".to_string(),
            priority: 0,
            is_enabled: true,
            condition: RuleCondition {
                skip_under: Some(50_000.0),
                exec_threshold: Some(100_000.0),
                ..RuleCondition::default()
            },
            steps: serde_json::Value::Null,
            created_at: configured_on(2026, 1, 5),
        },
        // Expenses of 1000 or more need two of three reviewers, then finance.
        ApprovalRule {
            id: "expense-staged".to_string(),
            flow_type: "expense".to_string(),
            priority: 10,
            is_enabled: true,
            condition: RuleCondition {
                min_amount: Some(1_000.0),
                ..RuleCondition::default()
            },
            steps: json!({
                "stages": [
                    {
                        "order": 1,
                        "approvers": [
                            { "type": "user", "id": "u-alice" },
                            { "type": "user", "id": "u-bob" },
                            { "type": "user", "id": "u-carol" }
                        ],
                        "completion": { "mode": "quorum", "quorum": 2 }
                    },
                    {
                        "order": 2,
                        "approvers": [ { "type": "group", "id": "finance" } ],
                        "completion": { "mode": "any" }
                    }
                ]
            }),
            created_at: configured_on(2026, 3, 1),
        },
        // Small expenses: one flat step.
        ApprovalRule {
            id: "expense-small".to_string(),
            flow_type: "expense".to_string(),
            priority: 0,
            is_enabled: true,
            condition: RuleCondition::default(),
            steps: json!([ { "approverGroupId": "mgmt", "stepOrder": 1 } ]),
            created_at: configured_on(2026, 3, 1),
        },
    ]
}

/// 09:00 UTC on the given day.
fn configured_on(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(9, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

// ── Users ─────────────────────────────────────────────────────────────────────

pub fn author() -> Actor {
    Actor::new("u-author").with_roles(&["staff"])
}

pub fn manager() -> Actor {
    Actor::new("u-manager")
        .with_roles(&["manager"])
        .with_groups(&["mgmt"])
}

pub fn executive() -> Actor {
    Actor::new("u-exec")
        .with_roles(&["executive"])
        .with_groups(&["exec"])
}

pub fn admin() -> Actor {
    Actor::new("u-admin")
        .with_roles(&["admin"])
        .with_groups(&["mgmt"])
}

pub fn worker() -> Actor {
    Actor::new("u-worker").with_roles(&["staff"])
}

pub fn reviewer(user_id: &str) -> Actor {
    Actor::new(user_id).with_roles(&["staff"])
}

pub fn finance_clerk() -> Actor {
    Actor::new("u-finance")
        .with_roles(&["staff"])
        .with_groups(&["finance"])
}
