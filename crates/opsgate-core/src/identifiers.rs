// crates/opsgate-core/src/identifiers.rs
// ============================================================================
// Module: Ops Gate Identifiers
// Description: Opaque, string-backed identifiers used across the pipeline.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque newtypes over `String`. Most are minted locally
//! (signals, decisions, reviews, queued actions all get an ID the moment
//! they are created here) rather than supplied by a caller, so each type
//! exposes a `generate()` constructor backed by a random UUID alongside the
//! explicit `new()` constructor used for deserialized or test data.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from an existing string value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mints a fresh, randomly generated identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier for a raw inbound `Signal`.
    SignalId
);
opaque_id!(
    /// Identifier for a `Decision` produced by the Decision Maker.
    DecisionId
);
opaque_id!(
    /// Identifier for a `ReviewItem` queued in the Review Manager.
    ReviewId
);
opaque_id!(
    /// Identifier for a `QueuedAction` owned by the Queue Manager.
    ActionId
);
opaque_id!(
    /// Identifier that follows an action from publisher through executor.
    CorrelationId
);
opaque_id!(
    /// Identifier for a publication recorded in the Output Publisher's audit log.
    PublicationId
);
opaque_id!(
    /// Deterministic fingerprint of a semantically equivalent LLM request.
    Fingerprint
);

#[cfg(test)]
mod tests {
    use super::SignalId;

    #[test]
    fn generate_produces_distinct_ids() {
        assert_ne!(SignalId::generate(), SignalId::generate());
    }

    #[test]
    fn round_trips_through_display_and_new() {
        let id = SignalId::new("e1");
        assert_eq!(id.as_str(), "e1");
        assert_eq!(id.to_string(), "e1");
    }
}
