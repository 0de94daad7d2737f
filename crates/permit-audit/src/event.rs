//! Audit event and log types.
//!
//! `AuditEvent` wraps one `DecisionRecord` with its position in the chain
//! and the hashes that make tampering detectable. `AuditLog` is the exported
//! snapshot of a whole stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use permit_contracts::record::DecisionRecord;

/// One entry in the SHA-256 hash chain of an audit stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub stream_id: String,

    pub record: DecisionRecord,

    /// Hash of the previous event, or `GENESIS_HASH` for the first one.
    pub prev_hash: String,

    /// Hash over (stream_id, sequence, prev_hash, canonical JSON of record).
    pub this_hash: String,
}

impl AuditEvent {
    /// The `prev_hash` of the first event in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// Exported snapshot of an audit stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub stream_id: String,

    /// Events in chain order.
    pub events: Vec<AuditEvent>,

    /// Ids passed to `finalize()` so far, in call order.
    pub sealed: Vec<String>,

    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last event. Empty when the log is empty.
    pub terminal_hash: String,
}
