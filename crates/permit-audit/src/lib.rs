//! # permit-audit
//!
//! Append-only, SHA-256 hash-chained audit trail for gated approval
//! decisions.
//!
//! ## Overview
//!
//! Every decision the approval flow records is wrapped in an `AuditEvent`
//! that links to the previous event by hash. Changing any stored record,
//! even one field of its guard failures, breaks the chain and is detected
//! by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use permit_audit::InMemoryAuditWriter;
//! use permit_core::traits::AuditWriter;
//!
//! let writer = InMemoryAuditWriter::new("erp-demo");
//! writer.write(&record)?;
//! assert!(writer.verify_integrity());
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{AuditEvent, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
