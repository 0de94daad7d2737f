//! Runtime error types for the PERMIT engine.
//!
//! Business outcomes (denials, guard failures) are never errors; they are
//! ordinary `Decision` values. `PermitError` is reserved for infrastructure
//! and configuration problems and for illegal approval-instance transitions.

use thiserror::Error;

/// The unified error type for the PERMIT crates.
#[derive(Debug, Error)]
pub enum PermitError {
    /// A policy file, settings file, or other configuration input is invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// An external store could not answer a lookup.
    ///
    /// Timeouts and retries belong to the store adapter; by the time this
    /// surfaces the adapter has given up.
    #[error("store '{store}' failed: {reason}")]
    StoreError { store: String, reason: String },

    /// An approval instance was asked to make an illegal transition.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    /// The acting user does not match any approver at the current stage.
    #[error("user '{user_id}' is not an approver at stage {step_order}")]
    NotAnApprover { user_id: String, step_order: u32 },

    /// The audit writer could not persist a decision record.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },
}

impl PermitError {
    pub fn store(store: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StoreError {
            store: store.into(),
            reason: reason.into(),
        }
    }

    pub fn state_machine(reason: impl Into<String>) -> Self {
        Self::StateMachineError {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the PERMIT crates.
pub type PermitResult<T> = Result<T, PermitError>;
