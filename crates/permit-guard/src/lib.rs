//! # permit-guard
//!
//! Runtime preconditions attached to authorization policies.
//!
//! This crate provides [`engine::GuardEvaluator`], which reads a policy's raw
//! guard list and checks each entry against the external stores:
//!
//! | guard                | fails when                                          |
//! |----------------------|-----------------------------------------------------|
//! | `approval_open`      | the target already has a pending approval instance  |
//! | `project_closed`     | any referenced project is closed                    |
//! | `period_lock`        | any (period, project) pair is frozen                |
//! | `editable_days`      | a work date is older than the edit window           |
//! | `chat_ack_completed` | a linked chat message is not fully acknowledged     |
//!
//! Unknown guard types always fail. Malformed guard lists become failures,
//! never errors; only store failures are returned as `Err`.

pub mod engine;
pub mod extract;

pub use engine::{GuardEvaluator, GuardStores};
