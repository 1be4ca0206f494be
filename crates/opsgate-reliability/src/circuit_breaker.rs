// crates/opsgate-reliability/src/circuit_breaker.rs
// ============================================================================
// Module: Circuit Breaker (L2)
// Description: Guards a downstream call, short-circuiting while failing.
// Purpose: Wrap opsgate_core::CircuitBreakerState with a call()/get_state()
//          surface and cached-fallback behavior for downstream callers.
// Dependencies: opsgate-core, tokio, tracing
// ============================================================================

//! ## Overview
//! `CircuitBreaker::call` wraps one fallible async operation. In `Closed`,
//! the call runs and failures are counted. In `Open`, the call
//! short-circuits to a fresh cached value, then to a supplied fallback,
//! then fails outright; once `timeout_ms` has elapsed since opening, the
//! next call is allowed through as a `HalfOpen` probe.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use opsgate_core::BreakerPhase;
use opsgate_core::CircuitBreakerState;
use opsgate_core::Timestamp;
use tokio::sync::Mutex;
use tracing::info;

/// Tunable thresholds for one breaker instance.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive `Closed` failures before opening.
    pub failure_threshold: u32,
    /// Consecutive `HalfOpen` successes before closing.
    pub success_threshold: u32,
    /// How long the breaker stays `Open` before allowing a probe.
    pub timeout: Duration,
    /// How long a cached fallback value is served while `Open`.
    pub cache_ttl: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_millis(60_000),
            cache_ttl: Duration::from_millis(30_000),
        }
    }
}

/// Outcome of a call that was short-circuited or failed outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakerError<E> {
    /// The breaker is open and no cache or fallback was available.
    Open,
    /// The wrapped operation itself failed.
    Inner(E),
}

impl<E: std::fmt::Display> std::fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "circuit breaker is open"),
            Self::Inner(err) => write!(f, "{err}"),
        }
    }
}

struct CachedFallback {
    value: String,
    cached_at: Timestamp,
}

/// One named circuit breaker instance.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: Mutex<CircuitBreakerState>,
    cached_fallback: Mutex<Option<CachedFallback>>,
}

impl CircuitBreaker {
    /// Builds a new, `Closed` breaker.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            config,
            state: Mutex::new(CircuitBreakerState::default()),
            cached_fallback: Mutex::new(None),
        })
    }

    /// The breaker's name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a snapshot of the current state.
    pub async fn get_state(&self) -> CircuitBreakerState {
        self.state.lock().await.clone()
    }

    /// Calls `operation`, applying the breaker's guard. `fallback`, if
    /// given, is invoked when the breaker is open and no fresh cached
    /// value is available, and its result is cached for `cache_ttl` on a
    /// subsequent failure.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] when short-circuited with nothing to
    /// serve, or [`BreakerError::Inner`] when the operation itself fails.
    pub async fn call<F, Fut, T, E>(
        &self,
        now: Timestamp,
        operation: F,
        fallback: Option<T>,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Clone + ToString + From<String>,
    {
        {
            let mut state = self.state.lock().await;
            if state.phase == BreakerPhase::Open {
                state.try_half_open(now, self.config.timeout);
            }
        }

        let phase = self.state.lock().await.phase;
        if phase == BreakerPhase::Open {
            if let Some(cached) = self.fresh_cached_fallback(now).await {
                return Ok(T::from(cached));
            }
            return fallback.ok_or(BreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(err) => {
                self.on_failure(now, fallback.as_ref()).await;
                Err(BreakerError::Inner(err))
            }
        }
    }

    async fn fresh_cached_fallback(&self, now: Timestamp) -> Option<String> {
        let cached = self.cached_fallback.lock().await;
        cached.as_ref().and_then(|entry| {
            if now.is_at_or_after(entry.cached_at.plus(self.config.cache_ttl)) {
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    async fn on_success(&self) {
        let mut state = self.state.lock().await;
        match state.phase {
            BreakerPhase::Closed => {
                state.failure_count = 0;
            }
            BreakerPhase::HalfOpen => {
                if state.record_half_open_success(self.config.success_threshold) {
                    info!(breaker = %self.name, "circuit closed after recovery");
                }
            }
            BreakerPhase::Open => {}
        }
    }

    async fn on_failure<T: ToString>(&self, now: Timestamp, fallback: Option<&T>) {
        let opened = {
            let mut state = self.state.lock().await;
            state.record_failure(now, self.config.failure_threshold)
        };
        if opened {
            info!(breaker = %self.name, "circuit opened");
            if let Some(fallback) = fallback {
                let mut cached = self.cached_fallback.lock().await;
                *cached = Some(CachedFallback {
                    value: fallback.to_string(),
                    cached_at: now,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BreakerConfig;
    use super::BreakerError;
    use super::CircuitBreaker;
    use opsgate_core::BreakerPhase;
    use opsgate_core::Timestamp;

    #[tokio::test]
    async fn opens_after_failure_threshold_and_short_circuits() {
        let breaker = CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 2,
                ..BreakerConfig::default()
            },
        );
        for _ in 0..2 {
            let result: Result<String, BreakerError<String>> = breaker
                .call(
                    Timestamp::from_unix_millis(0),
                    || async { Err::<String, String>("boom".to_string()) },
                    None,
                )
                .await;
            assert!(result.is_err());
        }
        assert_eq!(breaker.get_state().await.phase, BreakerPhase::Open);

        let result: Result<String, BreakerError<String>> = breaker
            .call(
                Timestamp::from_unix_millis(1),
                || async { Ok::<String, String>("should not run".to_string()) },
                None,
            )
            .await;
        assert_eq!(result, Err(BreakerError::Open));
    }

    #[tokio::test]
    async fn half_opens_after_timeout_and_closes_on_success() {
        let breaker = CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 1,
                success_threshold: 1,
                timeout: std::time::Duration::from_millis(100),
                ..BreakerConfig::default()
            },
        );
        let _: Result<String, BreakerError<String>> = breaker
            .call(
                Timestamp::from_unix_millis(0),
                || async { Err::<String, String>("boom".to_string()) },
                None,
            )
            .await;
        assert_eq!(breaker.get_state().await.phase, BreakerPhase::Open);

        let result: Result<String, BreakerError<String>> = breaker
            .call(
                Timestamp::from_unix_millis(200),
                || async { Ok::<String, String>("recovered".to_string()) },
                None,
            )
            .await;
        assert_eq!(result, Ok("recovered".to_string()));
        assert_eq!(breaker.get_state().await.phase, BreakerPhase::Closed);
    }

    #[tokio::test]
    async fn open_breaker_serves_fresh_cached_fallback() {
        let breaker = CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 1,
                ..BreakerConfig::default()
            },
        );
        let _: Result<String, BreakerError<String>> = breaker
            .call(
                Timestamp::from_unix_millis(0),
                || async { Err::<String, String>("boom".to_string()) },
                Some("fallback-value".to_string()),
            )
            .await;
        let result: Result<String, BreakerError<String>> = breaker
            .call(
                Timestamp::from_unix_millis(1),
                || async { Ok::<String, String>("should not run".to_string()) },
                None,
            )
            .await;
        assert_eq!(result, Ok("fallback-value".to_string()));
    }
}
