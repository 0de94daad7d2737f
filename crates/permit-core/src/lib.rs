//! # permit-core
//!
//! The boundary traits of the PERMIT engine and the approval flow that is
//! gated by them.
//!
//! `traits` defines the stores the guards read, the gates the engine exposes
//! and the audit sink. `flow` is the approval-instance state machine: it asks
//! an `ActionGate` before every transition and records every answer through
//! an `AuditWriter`.

pub mod flow;
pub mod traits;
