//! # permit-ref-erp
//!
//! ERP reference runtime for the PERMIT approval policy engine.
//!
//! Demonstrates four approval scenarios against in-memory stores:
//!
//! 1. **Invoice approval**: amount-driven ladder, pending labels, and the
//!    `approval_open` guard refusing a second submission.
//! 2. **Timesheet lock**: closed projects, period locks, and the edit window,
//!    with a manager policy that accepts late entries given a reason.
//! 3. **Acknowledgement override**: an unconfirmed chat acknowledgement
//!    blocks approval until an admin overrides it with a justification.
//! 4. **Staged quorum**: a two-of-three review stage followed by a finance
//!    stage, under legacy (no policy) gating.
//!
//! All data is fictional and held in memory.

pub mod mock_data;
pub mod runtime;
pub mod scenarios;
pub mod stores;

pub use runtime::ErpRuntime;
pub use stores::{FixedClock, InMemoryErp, LookupCounts};
