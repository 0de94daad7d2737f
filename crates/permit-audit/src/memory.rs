//! In-memory implementation of `AuditWriter`.
//!
//! `InMemoryAuditWriter` keeps one hash chain for a whole stream of
//! decisions (for example, every gated action of a service run). Approval
//! instances that reach a terminal status are sealed with `finalize()`;
//! sealing is logged and remembered but does not close the chain.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use permit_contracts::{
    error::{PermitError, PermitResult},
    record::DecisionRecord,
};
use permit_core::traits::AuditWriter;

use crate::{
    chain::{hash_event, verify_chain},
    event::{AuditEvent, AuditLog},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    pub(crate) events: Vec<AuditEvent>,
    pub(crate) sequence: u64,
    /// `this_hash` of the last event, or `GENESIS_HASH`.
    pub(crate) last_hash: String,
    pub(crate) sealed: Vec<String>,
}

// ── Public writer ─────────────────────────────────────────────────────────────

/// An in-memory, append-only audit writer backed by a SHA-256 hash chain.
///
/// Clones share the same chain.
#[derive(Clone)]
pub struct InMemoryAuditWriter {
    stream_id: String,
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryAuditWriter {
    pub fn new(stream_id: impl Into<String>) -> Self {
        let state = InMemoryState {
            events: Vec::new(),
            sequence: 0,
            last_hash: AuditEvent::GENESIS_HASH.to_string(),
            sealed: Vec::new(),
        };
        Self {
            stream_id: stream_id.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Snapshot every event written so far.
    pub fn export_log(&self) -> AuditLog {
        let state = self.read();
        AuditLog {
            stream_id: self.stream_id.clone(),
            events: state.events.clone(),
            sealed: state.sealed.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .events
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    /// Re-verify the in-memory chain.
    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read().events)
    }

    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads tolerate a poisoned lock: the chain itself is still verifiable.
    fn read(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> PermitResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| PermitError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }
}

// ── AuditWriter impl ──────────────────────────────────────────────────────────

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, record: &DecisionRecord) -> PermitResult<()> {
        let mut state = self.write_lock()?;

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let this_hash = hash_event(&self.stream_id, sequence, record, &prev_hash)?;

        debug!(
            stream_id = %self.stream_id,
            sequence,
            action = %record.action_key,
            allowed = record.outcome.allowed(),
            "decision recorded"
        );

        state.events.push(AuditEvent {
            sequence,
            stream_id: self.stream_id.clone(),
            record: record.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        Ok(())
    }

    fn finalize(&self, stream_id: &str) -> PermitResult<()> {
        let mut state = self.write_lock()?;
        state.sealed.push(stream_id.to_string());

        info!(
            stream_id = %self.stream_id,
            sealed = %stream_id,
            event_count = state.events.len(),
            terminal_hash = %state.last_hash,
            "audit stream sealed"
        );

        Ok(())
    }
}
