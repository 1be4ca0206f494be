// crates/opsgate-core/src/cache.rs
// ============================================================================
// Module: Response Cache Entry
// Description: A fingerprint-keyed, TTL-bounded cached LLM response.
// Purpose: Define CacheEntry and the enums governing its lifecycle.
// Dependencies: crate::{error, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! `CacheEntry` is the unit the Response Cache stores and evicts. An entry
//! is logically absent once `now >= expires_at` or `feedback = Incorrect`,
//! even though it may still physically be present until the next sweep;
//! callers must use [`CacheEntry::is_live`] rather than checking presence
//! alone.

use serde::Deserialize;
use serde::Serialize;

use crate::error::CoreError;
use crate::identifiers::Fingerprint;
use crate::time::Timestamp;

/// What kind of LLM response a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// A cached `Classification` payload.
    Classification,
    /// A cached `Decision` payload.
    Decision,
    /// Any other cached payload, using the configured default TTL.
    Other,
}

/// Human feedback recorded against a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    /// No feedback has been recorded.
    #[default]
    Unset,
    /// The cached response was confirmed correct.
    Correct,
    /// The cached response was confirmed incorrect; invalidates the entry.
    Incorrect,
}

/// A cached LLM response, keyed by fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Fingerprint this entry is stored under.
    pub fingerprint: Fingerprint,
    /// Serialized payload (the cached response body).
    pub payload: String,
    /// When this entry was written.
    pub created_at: Timestamp,
    /// When this entry expires.
    pub expires_at: Timestamp,
    /// Number of times this entry has been served.
    pub hit_count: u64,
    /// Last time this entry was served, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_hit_at: Option<Timestamp>,
    /// What kind of payload this entry holds.
    pub response_type: ResponseType,
    /// Opaque source tag, used by `invalidateBySource`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Feedback recorded against this entry.
    #[serde(default)]
    pub feedback: Feedback,
    /// Estimated prompt tokens this entry's original call consumed.
    pub estimated_prompt_tokens: u64,
    /// Estimated completion tokens this entry's original call consumed.
    pub estimated_completion_tokens: u64,
}

/// Minimum `hit_count` for an entry to be considered "hot" and a candidate
/// for warm-start persistence.
pub const HOT_ENTRY_HIT_THRESHOLD: u64 = 5;

impl CacheEntry {
    /// Builds a `CacheEntry`, enforcing `expires_at > created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invariant`] if `expires_at` does not strictly
    /// follow `created_at`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fingerprint: Fingerprint,
        payload: String,
        created_at: Timestamp,
        expires_at: Timestamp,
        response_type: ResponseType,
        source: Option<String>,
        estimated_prompt_tokens: u64,
        estimated_completion_tokens: u64,
    ) -> Result<Self, CoreError> {
        if !expires_at.is_at_or_after(created_at) || expires_at == created_at {
            return Err(CoreError::Invariant(
                "expires_at must be strictly after created_at".to_string(),
            ));
        }
        Ok(Self {
            fingerprint,
            payload,
            created_at,
            expires_at,
            hit_count: 0,
            last_hit_at: None,
            response_type,
            source,
            feedback: Feedback::Unset,
            estimated_prompt_tokens,
            estimated_completion_tokens,
        })
    }

    /// Returns whether this entry is still eligible to be served.
    #[must_use]
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.feedback != Feedback::Incorrect && !now.is_at_or_after(self.expires_at)
    }

    /// Returns whether this entry is "hot" enough to persist on warm-start.
    #[must_use]
    pub const fn is_hot(&self) -> bool {
        self.hit_count >= HOT_ENTRY_HIT_THRESHOLD
    }

    /// Records a hit, incrementing `hit_count` and updating `last_hit_at`.
    pub fn record_hit(&mut self, now: Timestamp) {
        self.hit_count += 1;
        self.last_hit_at = Some(now);
    }
}
