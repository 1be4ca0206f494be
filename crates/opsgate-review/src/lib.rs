// crates/opsgate-review/src/lib.rs
// ============================================================================
// Crate: opsgate-review
// Description: Human-approval queue with risk tiers and auto-expiration
//              (M5).
// Purpose: Hold every `ReviewItem` awaiting, or resolved by, human
//          approval, and run the risk-tiered auto-expiration sweep.
// Dependencies: opsgate-core, opsgate-reliability, serde, serde_json,
//               thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`ReviewManager`] is the Review Manager: `queue_for_review` accepts a
//! `ReasoningResult` that the Output Publisher decided needs a human in the
//! loop, `approve`/`reject` resolve it, and `auto_expire` runs the
//! risk-tiered sweep over items nearing expiry. Every transition is
//! persisted as a complete snapshot and announced on the event hub.

mod manager;

pub use manager::AutoExpireOutcome;
pub use manager::QueueFilters;
pub use manager::ReviewError;
pub use manager::ReviewManager;
pub use manager::ReviewStats;
pub use manager::WaitTimeStats;
