// crates/opsgate-router/src/router.rs
// ============================================================================
// Module: Action Router (H1)
// Description: Dispatches a Decision's action to its platform adapter.
// Dependencies: opsgate-core, opsgate-reliability
// ============================================================================

//! ## Overview
//! [`ActionRouter`] selects a registered [`PlatformAdapter`] by
//! `(action, platform)`, wraps the call in that pair's own
//! [`CircuitBreaker`], and enforces an optional per-platform call/time
//! budget. Unknown `(action, platform)` combinations, and budget
//! exhaustion, both return an `invalid_request`-shaped [`RouteResult`];
//! there is no fallback routing.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use opsgate_core::ActionKind;
use opsgate_core::ActionParams;
use opsgate_core::Decision;
use opsgate_core::Timestamp;
use opsgate_reliability::BreakerConfig;
use opsgate_reliability::BreakerError;
use opsgate_reliability::CircuitBreaker;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::warn;

/// An adapter that performs one action against one platform.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Executes `action_params` against the platform this adapter fronts.
    async fn execute(&self, action_params: &ActionParams) -> Result<Value, String>;
}

/// Optional per-platform request/time budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformBudget {
    /// Maximum dispatches allowed per day; `None` means unbounded.
    pub max_calls_per_day: Option<u64>,
    /// Maximum cumulative execution time allowed per day, in milliseconds;
    /// `None` means unbounded.
    pub max_time_ms_per_day: Option<u64>,
}

#[derive(Default)]
struct BudgetCounters {
    date_key: String,
    calls: u64,
    time_ms: u64,
}

/// Outcome of one [`ActionRouter::route_action`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteResult {
    /// Whether the action executed successfully.
    pub success: bool,
    /// The adapter's response payload, if it succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure detail, if it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time spent dispatching, in milliseconds.
    pub execution_time_ms: u64,
}

struct Route {
    adapter: std::sync::Arc<dyn PlatformAdapter>,
    breaker: std::sync::Arc<CircuitBreaker>,
    budget: PlatformBudget,
    counters: Mutex<BudgetCounters>,
}

/// Dispatches Decisions to registered platform adapters.
#[derive(Default)]
pub struct ActionRouter {
    routes: HashMap<String, Route>,
}

impl ActionRouter {
    /// Builds a router with no adapters registered.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `adapter` to handle `action` on `platform`, guarded by a
    /// dedicated circuit breaker and an optional call/time budget.
    pub fn register(
        &mut self,
        action: ActionKind,
        platform: impl Into<String>,
        adapter: std::sync::Arc<dyn PlatformAdapter>,
        breaker_config: BreakerConfig,
        budget: PlatformBudget,
    ) {
        let platform = platform.into();
        let key = route_key(action, &platform);
        let breaker = CircuitBreaker::new(key.clone(), breaker_config);
        self.routes.insert(
            key,
            Route {
                adapter,
                breaker,
                budget,
                counters: Mutex::new(BudgetCounters::default()),
            },
        );
    }

    /// Routes `decision` to its registered adapter, or returns an
    /// `invalid_request`-shaped result if none is registered or the
    /// platform's budget is exhausted.
    pub async fn route_action(&self, decision: &Decision, now: Timestamp) -> RouteResult {
        let start = Instant::now();
        if matches!(decision.action_params, ActionParams::Ignore) {
            return RouteResult { success: true, data: None, error: None, execution_time_ms: 0 };
        }

        let Some(platform) = decision.action_params.platform() else {
            return invalid_request("action has no target platform", start);
        };
        let key = route_key(decision.action(), platform);
        let Some(route) = self.routes.get(&key) else {
            return invalid_request(&format!("no adapter registered for {key}"), start);
        };

        if let Some(reason) = self.check_budget(route, now).await {
            return invalid_request(&reason, start);
        }

        let result = route
            .breaker
            .call(
                now,
                || async {
                    route
                        .adapter
                        .execute(&decision.action_params)
                        .await
                        .map(|value| serde_json::to_string(&value).unwrap_or_default())
                },
                None,
            )
            .await;

        let execution_time_ms = elapsed_ms(start);
        self.record_dispatch(route, execution_time_ms, now).await;

        match result {
            Ok(raw) => {
                let data = serde_json::from_str(&raw).ok();
                RouteResult { success: true, data, error: None, execution_time_ms }
            }
            Err(BreakerError::Open) => {
                warn!(route = %key, "circuit breaker open, dispatch short-circuited");
                RouteResult {
                    success: false,
                    data: None,
                    error: Some(format!("circuit breaker open for {key}")),
                    execution_time_ms,
                }
            }
            Err(BreakerError::Inner(err)) => {
                warn!(route = %key, error = %err, "adapter call failed");
                RouteResult { success: false, data: None, error: Some(err), execution_time_ms }
            }
        }
    }

    async fn check_budget(&self, route: &Route, now: Timestamp) -> Option<String> {
        if route.budget.max_calls_per_day.is_none() && route.budget.max_time_ms_per_day.is_none() {
            return None;
        }
        let mut counters = route.counters.lock().await;
        reset_if_new_day(&mut counters, now);
        if let Some(max_calls) = route.budget.max_calls_per_day {
            if counters.calls >= max_calls {
                return Some("daily call budget exhausted".to_string());
            }
        }
        if let Some(max_time_ms) = route.budget.max_time_ms_per_day {
            if counters.time_ms >= max_time_ms {
                return Some("daily time budget exhausted".to_string());
            }
        }
        None
    }

    async fn record_dispatch(&self, route: &Route, execution_time_ms: u64, now: Timestamp) {
        let mut counters = route.counters.lock().await;
        reset_if_new_day(&mut counters, now);
        counters.calls += 1;
        counters.time_ms += execution_time_ms;
    }
}

fn reset_if_new_day(counters: &mut BudgetCounters, now: Timestamp) {
    let today = now.date_key();
    if counters.date_key != today {
        counters.date_key = today;
        counters.calls = 0;
        counters.time_ms = 0;
    }
}

fn invalid_request(reason: &str, start: Instant) -> RouteResult {
    RouteResult {
        success: false,
        data: None,
        error: Some(format!("invalid_request: {reason}")),
        execution_time_ms: elapsed_ms(start),
    }
}

#[allow(clippy::cast_possible_truncation, reason = "dispatch calls never run anywhere near u64::MAX ms")]
fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn route_key(action: ActionKind, platform: &str) -> String {
    let action_str = match action {
        ActionKind::CreateTask => "create_task",
        ActionKind::SendNotification => "send_notification",
        ActionKind::UpdateSheet => "update_sheet",
        ActionKind::FileDocument => "file_document",
        ActionKind::Delegate => "delegate",
        ActionKind::Escalate => "escalate",
        ActionKind::Ignore => "ignore",
    };
    format!("{action_str}@{platform}")
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use std::sync::Arc;

    use opsgate_core::CreateTaskParams;
    use opsgate_core::DecisionId;
    use opsgate_core::SignalId;
    use opsgate_core::ValidationResult;
    use serde_json::json;

    use super::*;

    struct EchoAdapter;

    #[async_trait]
    impl PlatformAdapter for EchoAdapter {
        async fn execute(&self, action_params: &ActionParams) -> Result<Value, String> {
            Ok(json!({"echoed": format!("{action_params:?}").len()}))
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl PlatformAdapter for FailingAdapter {
        async fn execute(&self, _action_params: &ActionParams) -> Result<Value, String> {
            Err("platform unreachable".to_string())
        }
    }

    fn decision(action_params: ActionParams) -> Decision {
        Decision::new(
            DecisionId::new("d1"),
            SignalId::new("s1"),
            action_params,
            false,
            "create a tracked task for the reported issue".to_string(),
            0.9,
            Timestamp::from_unix_millis(0),
            ValidationResult::default(),
            5,
        )
        .expect("valid decision")
    }

    fn create_task(platform: &str) -> ActionParams {
        ActionParams::CreateTask(CreateTaskParams {
            platform: platform.to_string(),
            title: "fix the thing".to_string(),
            description: None,
            assignee: None,
            due_date: None,
            extra_attributes: Default::default(),
        })
    }

    #[tokio::test]
    async fn unregistered_combination_is_invalid_request() {
        let router = ActionRouter::new();
        let result = router.route_action(&decision(create_task("notion")), Timestamp::from_unix_millis(0)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("invalid_request"));
    }

    #[tokio::test]
    async fn registered_adapter_executes_successfully() {
        let mut router = ActionRouter::new();
        router.register(
            ActionKind::CreateTask,
            "notion",
            Arc::new(EchoAdapter),
            BreakerConfig::default(),
            PlatformBudget::default(),
        );
        let result = router.route_action(&decision(create_task("notion")), Timestamp::from_unix_millis(0)).await;
        assert!(result.success);
        assert!(result.data.is_some());
    }

    #[tokio::test]
    async fn failing_adapter_surfaces_its_error() {
        let mut router = ActionRouter::new();
        router.register(
            ActionKind::CreateTask,
            "notion",
            Arc::new(FailingAdapter),
            BreakerConfig::default(),
            PlatformBudget::default(),
        );
        let result = router.route_action(&decision(create_task("notion")), Timestamp::from_unix_millis(0)).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("platform unreachable"));
    }

    #[tokio::test]
    async fn call_budget_exhaustion_is_invalid_request() {
        let mut router = ActionRouter::new();
        router.register(
            ActionKind::CreateTask,
            "notion",
            Arc::new(EchoAdapter),
            BreakerConfig::default(),
            PlatformBudget { max_calls_per_day: Some(1), max_time_ms_per_day: None },
        );
        let now = Timestamp::from_unix_millis(0);
        let first = router.route_action(&decision(create_task("notion")), now).await;
        assert!(first.success);
        let second = router.route_action(&decision(create_task("notion")), now).await;
        assert!(!second.success);
        assert!(second.error.unwrap().contains("budget"));
    }

    #[tokio::test]
    async fn ignore_action_is_a_no_op_success() {
        let router = ActionRouter::new();
        let result = router.route_action(&decision(ActionParams::Ignore), Timestamp::from_unix_millis(0)).await;
        assert!(result.success);
        assert!(result.data.is_none());
    }
}
