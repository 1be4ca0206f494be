// crates/opsgate-core/src/breaker.rs
// ============================================================================
// Module: Circuit Breaker State
// Description: The three-state guard data the Circuit Breaker tracks.
// Purpose: Define CircuitBreakerState and its CLOSED/OPEN/HALF_OPEN machine.
// Dependencies: crate::time, serde
// ============================================================================

//! ## Overview
//! `CircuitBreakerState` is the data a Circuit Breaker instance owns; the
//! transition logic itself (thresholds, cooldown, cached fallback) lives in
//! the reliability crate, which mutates this state through the methods
//! below so the state machine's shape cannot be bypassed by direct field
//! writes.

use serde::Deserialize;
use serde::Serialize;

use crate::time::Timestamp;

/// The three states a circuit breaker may be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPhase {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls short-circuit to a fallback or fail fast.
    Open,
    /// A probe call is in flight; success/failure decide the next phase.
    HalfOpen,
}

/// State owned by one Circuit Breaker instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    /// Current phase.
    pub phase: BreakerPhase,
    /// Consecutive failures observed in `Closed`, or the single failure
    /// that reopened from `HalfOpen`.
    pub failure_count: u32,
    /// Consecutive successes observed in `HalfOpen`.
    pub success_count: u32,
    /// When the breaker most recently transitioned to `Open`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<Timestamp>,
    /// Cached fallback payload, valid until its own TTL elapses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            phase: BreakerPhase::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            cache: None,
        }
    }
}

impl CircuitBreakerState {
    /// Records a failure. In `Closed`, increments `failure_count` and
    /// returns whether the caller should now open the breaker (compare
    /// against `failure_threshold`). In `HalfOpen`, any failure reopens
    /// immediately.
    pub fn record_failure(&mut self, now: Timestamp, failure_threshold: u32) -> bool {
        match self.phase {
            BreakerPhase::Closed => {
                self.failure_count += 1;
                if self.failure_count >= failure_threshold {
                    self.open(now);
                    true
                } else {
                    false
                }
            }
            BreakerPhase::HalfOpen => {
                self.open(now);
                true
            }
            BreakerPhase::Open => false,
        }
    }

    /// Records a success in `HalfOpen`. Returns whether the breaker just
    /// closed (compare the caller's `success_threshold`).
    pub fn record_half_open_success(&mut self, success_threshold: u32) -> bool {
        if self.phase != BreakerPhase::HalfOpen {
            return false;
        }
        self.success_count += 1;
        if self.success_count >= success_threshold {
            self.phase = BreakerPhase::Closed;
            self.failure_count = 0;
            self.success_count = 0;
            self.opened_at = None;
            true
        } else {
            false
        }
    }

    /// Transitions `Open` to `HalfOpen` once `timeout` has elapsed since
    /// opening. Returns whether the transition happened.
    pub fn try_half_open(&mut self, now: Timestamp, timeout: std::time::Duration) -> bool {
        if self.phase != BreakerPhase::Open {
            return false;
        }
        let Some(opened_at) = self.opened_at else {
            return false;
        };
        if now.is_at_or_after(opened_at.plus(timeout)) {
            self.phase = BreakerPhase::HalfOpen;
            self.success_count = 0;
            true
        } else {
            false
        }
    }

    fn open(&mut self, now: Timestamp) {
        self.phase = BreakerPhase::Open;
        self.opened_at = Some(now);
        self.success_count = 0;
    }
}
