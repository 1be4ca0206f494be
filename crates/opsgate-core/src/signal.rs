// crates/opsgate-core/src/signal.rs
// ============================================================================
// Module: Signal
// Description: The immutable input that enters the reasoning pipeline.
// Purpose: Define the Signal type and its source taxonomy.
// Dependencies: crate::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A `Signal` is created once by a source adapter (out of scope here) and is
//! never mutated afterward; it is dropped once the pipeline completes or a
//! review decision resolves it.

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::SignalId;
use crate::time::Timestamp;

/// Where a `Signal` originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// An inbound email message.
    Email,
    /// A chat message in a collaboration tool.
    Chat,
    /// A full spreadsheet snapshot.
    Sheet,
    /// An incremental spreadsheet change.
    SheetUpdate,
    /// A manually submitted signal.
    Manual,
}

/// An opaque attachment reference carried alongside a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Attachment file name.
    pub name: String,
    /// Attachment MIME type, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Opaque locator (URL, storage key) the adapter can resolve.
    pub reference: String,
}

/// A raw, immutable input to the reasoning pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    /// Globally unique identifier for this signal.
    pub id: SignalId,
    /// Where the signal originated.
    pub source: SignalSource,
    /// Optional subject line (email/chat thread title).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Raw body text.
    pub body: String,
    /// Optional sender identity, as reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// When the signal was observed by the adapter.
    pub timestamp: Timestamp,
    /// Attachments carried with the signal, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Signal {
    /// Returns whether `sender` is present and not in `trusted_senders`.
    ///
    /// Used by the reasoning pipeline's `requiresHumanReview` rule for
    /// spam classifications from an untrusted sender.
    #[must_use]
    pub fn is_untrusted_sender(&self, trusted_senders: &[String]) -> bool {
        match &self.sender {
            Some(sender) => !trusted_senders.iter().any(|trusted| trusted == sender),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Signal;
    use super::SignalSource;
    use crate::identifiers::SignalId;
    use crate::time::Timestamp;

    fn sample_signal(sender: Option<&str>) -> Signal {
        Signal {
            id: SignalId::new("e1"),
            source: SignalSource::Email,
            subject: Some("[URGENT] API Down".to_string()),
            body: "500 errors in production".to_string(),
            sender: sender.map(str::to_string),
            timestamp: Timestamp::from_unix_millis(0),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn missing_sender_is_untrusted() {
        let signal = sample_signal(None);
        assert!(signal.is_untrusted_sender(&["ops@co".to_string()]));
    }

    #[test]
    fn known_sender_is_trusted() {
        let signal = sample_signal(Some("ops@co"));
        assert!(!signal.is_untrusted_sender(&["ops@co".to_string()]));
    }
}
