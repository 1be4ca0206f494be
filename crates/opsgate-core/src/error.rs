// crates/opsgate-core/src/error.rs
// ============================================================================
// Module: Ops Gate Core Errors
// Description: Invariant-violation errors raised by core data constructors.
// Purpose: Give every crate a shared, local error type for malformed values.
// Dependencies: thiserror
// ============================================================================

use thiserror::Error;

/// Errors raised when a core type's constructor invariant is violated.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A numeric value fell outside its required range.
    #[error("{field} must be within [{min}, {max}], got {actual}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
        /// Value that was supplied.
        actual: f64,
    },
    /// A string field's length fell outside its required bounds.
    #[error("{field} length must be within [{min}, {max}] chars, got {actual}")]
    InvalidLength {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum length, inclusive.
        min: usize,
        /// Maximum length, inclusive.
        max: usize,
        /// Length that was supplied.
        actual: usize,
    },
    /// An invariant that does not reduce to a simple range/length check.
    #[error("invariant violated: {0}")]
    Invariant(String),
}
