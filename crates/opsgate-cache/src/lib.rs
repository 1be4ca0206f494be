// crates/opsgate-cache/src/lib.rs
// ============================================================================
// Crate: opsgate-cache
// Description: Fingerprint-keyed response cache (L6).
// Purpose: Deduplicate identical LLM requests and retain useful answers
//          across process restarts.
// Dependencies: opsgate-core, opsgate-reliability, sha2, tokio, tracing
// ============================================================================

//! ## Overview
//! The cache holds one [`CacheEntry`] per fingerprint behind a single
//! `tokio::sync::Mutex`, mirroring this workspace's single-critical-section
//! mutation discipline: every mutating operation takes the lock once, does
//! its bookkeeping, and releases it; reads of the same map also go through
//! the lock since a `HashMap` offers no safe concurrent-read path, but the
//! critical section itself is kept minimal. Persistence restores only "hot"
//! entries (`hit_count >= HOT_ENTRY_HIT_THRESHOLD`) on `load`, matching the
//! warm-start contract.

mod fingerprint;

pub use fingerprint::fingerprint_of;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use opsgate_core::CacheEntry;
use opsgate_core::Feedback;
use opsgate_core::Fingerprint;
use opsgate_core::ResponseType;
use opsgate_core::Timestamp;
use opsgate_reliability::load_snapshot;
use opsgate_reliability::write_snapshot;
use opsgate_reliability::PersistenceError;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;

/// TTL applied to entries of each response type, unless a `put` override is
/// given.
#[derive(Debug, Clone, Copy)]
pub struct TtlConfig {
    /// TTL for `Classification` entries.
    pub classification: Duration,
    /// TTL for `Decision` entries.
    pub decision: Duration,
    /// TTL for any other entry, unless overridden.
    pub other_default: Duration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            classification: Duration::from_secs(60 * 60),
            decision: Duration::from_secs(30 * 60),
            other_default: Duration::from_secs(15 * 60),
        }
    }
}

impl TtlConfig {
    fn ttl_for(&self, response_type: ResponseType, ttl_override: Option<Duration>) -> Duration {
        ttl_override.unwrap_or(match response_type {
            ResponseType::Classification => self.classification,
            ResponseType::Decision => self.decision,
            ResponseType::Other => self.other_default,
        })
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total `get` calls observed.
    pub total_requests: u64,
    /// `get` calls that returned a live entry.
    pub hits: u64,
    /// `get` calls that found nothing live.
    pub misses: u64,
    /// Entries currently meeting the hot threshold.
    pub hot_entry_count: u64,
    /// Estimated prompt+completion cost avoided by cache hits, in
    /// micro-dollars (using each hit entry's recorded estimate).
    pub estimated_cost_saved_micros: u64,
    /// Estimated prompt+completion tokens avoided by cache hits.
    pub tokens_saved: u64,
}

impl CacheStats {
    /// Hits divided by total requests, `0.0` if there have been none.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss, reason = "request counts fit comfortably in f64 mantissa")]
        {
            self.hits as f64 / self.total_requests as f64
        }
    }
}

/// A pre-computed entry to install via [`ResponseCache::warm_cache`].
pub struct WarmPattern {
    /// Fingerprint components identical to those used at `get`/`put` time.
    pub fingerprint: Fingerprint,
    /// The response body to install.
    pub precomputed_response: String,
    /// The response type the installed entry should carry.
    pub response_type: ResponseType,
}

#[derive(Default, Serialize, Deserialize)]
struct CacheSnapshot {
    entries: Vec<CacheEntry>,
}

/// Fingerprint-keyed cache of LLM responses with TTL eviction and
/// correctness feedback.
pub struct ResponseCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    stats: Mutex<CacheStats>,
    ttl: TtlConfig,
    store_path: PathBuf,
}

impl ResponseCache {
    /// Builds an empty cache persisting to `store_path`.
    #[must_use]
    pub fn new(ttl: TtlConfig, store_path: PathBuf) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
            ttl,
            store_path,
        }
    }

    /// Returns the stored payload for `fingerprint` if it exists and is
    /// still live, recording a hit and bumping statistics.
    pub async fn get(&self, fingerprint: &Fingerprint, now: Timestamp) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let mut stats = self.stats.lock().await;
        stats.total_requests += 1;
        let Some(entry) = entries.get_mut(fingerprint) else {
            stats.misses += 1;
            return None;
        };
        if !entry.is_live(now) {
            stats.misses += 1;
            return None;
        }
        entry.record_hit(now);
        stats.hits += 1;
        stats.tokens_saved += entry.estimated_prompt_tokens + entry.estimated_completion_tokens;
        Some(entry.payload.clone())
    }

    /// Writes a new entry, replacing any entry under the same fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`opsgate_core::CoreError`] if the constructed entry
    /// violates its own invariants (expiry not strictly after creation).
    #[allow(clippy::too_many_arguments)]
    pub async fn put(
        &self,
        fingerprint: Fingerprint,
        payload: String,
        response_type: ResponseType,
        source: Option<String>,
        estimated_prompt_tokens: u64,
        estimated_completion_tokens: u64,
        ttl_override: Option<Duration>,
        now: Timestamp,
    ) -> Result<(), opsgate_core::CoreError> {
        let ttl = self.ttl.ttl_for(response_type, ttl_override);
        let entry = CacheEntry::new(
            fingerprint.clone(),
            payload,
            now,
            now.plus(ttl),
            response_type,
            source,
            estimated_prompt_tokens,
            estimated_completion_tokens,
        )?;
        self.entries.lock().await.insert(fingerprint, entry);
        Ok(())
    }

    /// Records feedback against an entry. `Correct` is a no-op beyond the
    /// recorded value; `Incorrect` makes the entry immediately non-live.
    pub async fn mark_feedback(&self, fingerprint: &Fingerprint, feedback: Feedback) {
        if let Some(entry) = self.entries.lock().await.get_mut(fingerprint) {
            entry.feedback = feedback;
        }
    }

    /// Removes every entry whose `source` matches `source`, returning the
    /// count removed.
    pub async fn invalidate_by_source(&self, source: &str) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.source.as_deref() != Some(source));
        before - entries.len()
    }

    /// Installs precomputed entries, returning how many were installed.
    ///
    /// # Errors
    ///
    /// Returns [`opsgate_core::CoreError`] if any constructed entry
    /// violates its own invariants.
    pub async fn warm_cache(
        &self,
        patterns: Vec<WarmPattern>,
        now: Timestamp,
    ) -> Result<usize, opsgate_core::CoreError> {
        let mut installed = 0;
        for pattern in patterns {
            self.put(
                pattern.fingerprint,
                pattern.precomputed_response,
                pattern.response_type,
                None,
                0,
                0,
                None,
                now,
            )
            .await?;
            installed += 1;
        }
        Ok(installed)
    }

    /// Persists every entry meeting the hot threshold.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot cannot be written.
    pub async fn save(&self) -> Result<(), PersistenceError> {
        let entries: Vec<CacheEntry> = self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.is_hot())
            .cloned()
            .collect();
        write_snapshot(&self.store_path, &CacheSnapshot { entries }).await
    }

    /// Restores entries previously persisted by [`ResponseCache::save`].
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the snapshot exists but cannot be
    /// read or parsed.
    pub async fn load(&self) -> Result<(), PersistenceError> {
        if let Some(snapshot) = load_snapshot::<CacheSnapshot>(&self.store_path).await? {
            let mut entries = self.entries.lock().await;
            for entry in snapshot.entries {
                entries.insert(entry.fingerprint.clone(), entry);
            }
        }
        Ok(())
    }

    /// Returns a snapshot of current statistics, including the live hot
    /// entry count.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().await.clone();
        stats.hot_entry_count = self.entries.lock().await.values().filter(|entry| entry.is_hot()).count() as u64;
        stats
    }
}
