// crates/opsgate-publisher/src/lib.rs
// ============================================================================
// Crate: opsgate-publisher
// Description: The gate between reasoning and execution (M6).
// Purpose: Validate a ReasoningResult, route it to review or format it for
//          dispatch, and keep the audit trail of every outcome.
// Dependencies: opsgate-core, opsgate-reliability, opsgate-review, serde,
//               serde_json, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`Publisher`] is the Output Publisher: `publish` validates a
//! `ReasoningResult`, rejects it outright, hands it to the Review Manager,
//! or emits it as a ready-to-run `FormattedAction`.
//! `retry_due` re-attempts publications stalled on a transient review-queue
//! fault, and `get_audit_log` exposes the capped audit trail.

mod publisher;

pub use publisher::derive_review_reasons;
pub use publisher::urgency_to_priority;
pub use publisher::validate_for_publish;
pub use publisher::ActionContext;
pub use publisher::AuditEntry;
pub use publisher::AuditFilters;
pub use publisher::AuditStatus;
pub use publisher::FormattedAction;
pub use publisher::PublishOutcome;
pub use publisher::Publisher;
pub use publisher::PublisherError;
pub use publisher::RetryPolicy;
pub use publisher::ValidationOutcome;
pub use publisher::DEFAULT_MAX_AUDIT_LOG_SIZE;
pub use publisher::DEFAULT_MAX_RETRY_ATTEMPTS;
pub use publisher::DEFAULT_RETRY_INTERVAL;
