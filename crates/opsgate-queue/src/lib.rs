// crates/opsgate-queue/src/lib.rs
// ============================================================================
// Crate: opsgate-queue
// Description: Durable priority queue executing approved actions with
//              bounded concurrency and per-platform rate limits (H2).
// Purpose: Own every QueuedAction from enqueue through a terminal status,
//          dispatching through the Action Router on a fixed cadence.
// Dependencies: opsgate-core, opsgate-reliability, opsgate-router, serde,
//               serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`QueueManager`] is the Queue Manager: `enqueue` admits an approved
//! action, `process_queue` runs one scheduling tick (priority then age
//! ordering, a concurrency cap, per-platform rate limiting, and
//! exponential backoff on failure), and `pause`/`resume`/`clear` give an
//! operator direct control over the pipeline. `init`/`shutdown` persist
//! the queue across restarts.

mod manager;

pub use manager::QueueError;
pub use manager::QueueManager;
pub use manager::QueueStats;
pub use manager::RateLimitTable;
pub use manager::TickOutcome;
pub use manager::BACKOFF_BASE;
pub use manager::DEFAULT_PRIORITY;
pub use manager::MAX_CONCURRENT;
pub use manager::PROCESSING_INTERVAL;
