// crates/opsgate-core/src/time.rs
// ============================================================================
// Module: Ops Gate Time Model
// Description: Wall-clock timestamp used for TTLs, rate limits, and resets.
// Purpose: Centralize "now" so the rest of the workspace never calls the
//          system clock directly.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Unlike a deterministic replay engine, this system's invariants (cache
//! TTL expiry, review auto-expiration, per-platform rate limiting, daily
//! token budget resets at local midnight) are inherently wall-clock driven.
//! `Timestamp` wraps [`time::OffsetDateTime`] and is the only place that
//! reads the system clock; everywhere else takes a `Timestamp` by value.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::UtcOffset;

/// A point in time, serialized as Unix milliseconds.
///
/// # Invariants
/// - Arithmetic saturates rather than panics; callers never observe a
///   `Timestamp` wrapping around `i64` bounds in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self(now.unix_timestamp() * 1000 + i64::from(now.millisecond()))
    }

    /// Builds a timestamp from raw Unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as Unix milliseconds.
    #[must_use]
    pub const fn unix_millis(self) -> i64 {
        self.0
    }

    /// Returns a timestamp offset forward by the given duration.
    #[must_use]
    pub fn plus(self, duration: Duration) -> Self {
        #[allow(clippy::cast_possible_wrap, reason = "durations used here are bounded in days")]
        let millis = duration.as_millis() as i64;
        Self(self.0.saturating_add(millis))
    }

    /// Returns whether this timestamp is at or after `other`.
    #[must_use]
    pub const fn is_at_or_after(self, other: Self) -> bool {
        self.0 >= other.0
    }

    /// Returns the local-midnight boundary that starts the day containing
    /// this timestamp, using the given UTC offset.
    #[must_use]
    pub fn local_midnight(self, offset: UtcOffset) -> Self {
        let dt = OffsetDateTime::from_unix_timestamp(self.0 / 1000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
            .to_offset(offset);
        let midnight = dt.replace_time(time::Time::MIDNIGHT);
        Self(midnight.unix_timestamp() * 1000)
    }

    /// Returns the ISO-8601 date (`YYYY-MM-DD`) this timestamp falls on in
    /// UTC, used as the key for daily token-usage rollups.
    #[must_use]
    pub fn date_key(self) -> String {
        let dt = OffsetDateTime::from_unix_timestamp(self.0 / 1000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        format!("{:04}-{:02}-{:02}", dt.year(), u8::from(dt.month()), dt.day())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Timestamp;

    #[test]
    fn plus_advances_by_duration() {
        let start = Timestamp::from_unix_millis(0);
        let later = start.plus(Duration::from_secs(60));
        assert_eq!(later.unix_millis(), 60_000);
        assert!(later.is_at_or_after(start));
    }

    #[test]
    fn date_key_is_stable_for_same_day() {
        let a = Timestamp::from_unix_millis(1_700_000_000_000);
        let b = Timestamp::from_unix_millis(1_700_000_000_000 + 1000);
        assert_eq!(a.date_key(), b.date_key());
    }
}
