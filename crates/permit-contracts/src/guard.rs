//! Guard kinds and guard failure types.
//!
//! Guards are stored as JSON objects carrying a `type` string. The engine
//! maps that string onto the closed `GuardKind` set; anything it does not
//! recognize becomes `GuardKind::Unknown` and always fails.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The guard types the engine knows how to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GuardKind {
    ApprovalOpen,
    ProjectClosed,
    PeriodLock,
    EditableDays,
    ChatAckCompleted,
    /// A `type` string outside the known set.
    Unknown(String),
}

impl GuardKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "approval_open" => Self::ApprovalOpen,
            "project_closed" => Self::ProjectClosed,
            "period_lock" => Self::PeriodLock,
            "editable_days" => Self::EditableDays,
            "chat_ack_completed" => Self::ChatAckCompleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ApprovalOpen => "approval_open",
            Self::ProjectClosed => "project_closed",
            Self::PeriodLock => "period_lock",
            Self::EditableDays => "editable_days",
            Self::ChatAckCompleted => "chat_ack_completed",
            Self::Unknown(name) => name,
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed guard entry: its kind plus any extra keys from the stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardSpec {
    pub kind: GuardKind,
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Why a single guard failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardFailureReason {
    TargetRequired,
    UnsupportedTarget,
    MissingLink,
    Incomplete,
    Expired,
    ProjectRequired,
    PeriodRequired,
    #[serde(rename = "workDate_required")]
    WorkDateRequired,
    EditWindowExpired,
    ApprovalInProgress,
    ProjectIsClosed,
    PeriodLocked,
    UnknownGuardType,
    InvalidSchema,
    InvalidItem,
}

impl GuardFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TargetRequired => "target_required",
            Self::UnsupportedTarget => "unsupported_target",
            Self::MissingLink => "missing_link",
            Self::Incomplete => "incomplete",
            Self::Expired => "expired",
            Self::ProjectRequired => "project_required",
            Self::PeriodRequired => "period_required",
            Self::WorkDateRequired => "workDate_required",
            Self::EditWindowExpired => "edit_window_expired",
            Self::ApprovalInProgress => "approval_in_progress",
            Self::ProjectIsClosed => "project_is_closed",
            Self::PeriodLocked => "period_locked",
            Self::UnknownGuardType => "unknown_guard_type",
            Self::InvalidSchema => "invalid_schema",
            Self::InvalidItem => "invalid_item",
        }
    }
}

impl fmt::Display for GuardFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failing guard, with enough detail to render a message and audit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardFailure {
    /// The guard's `type` string (`"schema"` for a malformed guard list).
    #[serde(rename = "type")]
    pub guard_type: String,
    pub reason: GuardFailureReason,
    /// Diagnostic payload, e.g. offending project or period ids.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl GuardFailure {
    pub fn new(guard_type: impl Into<String>, reason: GuardFailureReason) -> Self {
        Self {
            guard_type: guard_type.into(),
            reason,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn is_kind(&self, kind: &GuardKind) -> bool {
        self.guard_type == kind.as_str()
    }
}
