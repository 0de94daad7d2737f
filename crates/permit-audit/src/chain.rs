//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. stream_id as UTF-8
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 (64 hex chars)
//!   4. compact JSON of the decision record

use sha2::{Digest, Sha256};

use permit_contracts::{
    error::{PermitError, PermitResult},
    record::DecisionRecord,
};

use crate::event::AuditEvent;

/// Compute the lowercase hex SHA-256 of one audit event.
pub fn hash_event(
    stream_id: &str,
    sequence: u64,
    record: &DecisionRecord,
    prev_hash: &str,
) -> PermitResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| PermitError::AuditWriteFailed {
        reason: format!("decision record could not be serialized: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(stream_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// True when every event links to its predecessor (or the genesis hash),
/// carries the next sequence number, and its stored hash matches its
/// content. An empty chain is valid.
pub fn verify_chain(events: &[AuditEvent]) -> bool {
    let mut expected_prev = AuditEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.stream_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
