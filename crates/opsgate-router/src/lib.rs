// crates/opsgate-router/src/lib.rs
// ============================================================================
// Crate: opsgate-router
// Description: Dispatches a validated Decision to its platform adapter,
//              guarded by a per-integration circuit breaker (H1).
// Purpose: Select the adapter for an (action, platform) pair and report a
//          uniform success/error/timing result.
// Dependencies: opsgate-core, opsgate-reliability, async-trait, serde,
//               serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! [`ActionRouter`] is the Action Router: `route_action` selects the
//! [`PlatformAdapter`] registered for a decision's `(action, platform)`
//! pair, wraps the call in that pair's circuit breaker, and enforces an
//! optional per-platform call/time budget. Unknown combinations and
//! exhausted budgets both return an `invalid_request` result.

mod router;

pub use router::ActionRouter;
pub use router::PlatformAdapter;
pub use router::PlatformBudget;
pub use router::RouteResult;
