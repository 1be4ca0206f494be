// crates/opsgate-reliability/src/integration_manager.rs
// ============================================================================
// Module: Integration Manager (L4)
// Description: Lifecycle supervisor for adapters (email, chat, sheets,
//              downstream platforms).
// Purpose: Give every adapter a uniform start/stop/health contract and
//          auto-reconnect loop, and expose a single status dashboard.
// Dependencies: opsgate-core, tokio, tracing
// ============================================================================

//! ## Overview
//! An [`Integration`] is anything with a name and an optional
//! start/stop/health-check lifecycle. The manager starts every registered
//! integration, and for any integration reporting
//! [`HealthStatus::Disconnected`] or [`HealthStatus::Error`], retries its
//! `start` on a fixed interval until it reconnects, emitting a
//! `service.reconnected` [`HubEvent`] when it does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsgate_core::EventPriority;
use opsgate_core::HubEvent;
use opsgate_core::Timestamp;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::event_hub::EventHub;

/// Fixed interval between auto-reconnect attempts.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Health of one integration, as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthStatus {
    /// Connected and healthy.
    Connected,
    /// Cleanly not connected (e.g. stopped).
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Last health check or start attempt errored.
    Error,
    /// No health check has run yet.
    #[default]
    Unknown,
}

/// An adapter managed by the [`IntegrationManager`].
#[async_trait]
pub trait Integration: Send + Sync {
    /// The integration's name, used as its dashboard key.
    fn name(&self) -> &str;
    /// Starts the integration. Called at manager startup and on every
    /// reconnect attempt while unhealthy.
    async fn start(&self) -> Result<(), String>;
    /// Stops the integration. Called at manager shutdown.
    async fn stop(&self) -> Result<(), String>;
    /// Checks current health, independent of the last start's outcome.
    async fn health(&self) -> HealthStatus;
}

struct ManagedIntegration {
    integration: Arc<dyn Integration>,
    last_status: HealthStatus,
}

/// Supervises the lifecycle of every registered [`Integration`].
pub struct IntegrationManager {
    integrations: Mutex<HashMap<String, ManagedIntegration>>,
    event_hub: Arc<EventHub>,
}

impl IntegrationManager {
    /// Builds an empty manager that publishes `service.reconnected` events
    /// to `event_hub`.
    #[must_use]
    pub fn new(event_hub: Arc<EventHub>) -> Self {
        Self {
            integrations: Mutex::new(HashMap::new()),
            event_hub,
        }
    }

    /// Registers `integration`, replacing any prior registration under the
    /// same name.
    pub async fn register(&self, integration: Arc<dyn Integration>) {
        let mut integrations = self.integrations.lock().await;
        integrations.insert(
            integration.name().to_string(),
            ManagedIntegration {
                integration,
                last_status: HealthStatus::Unknown,
            },
        );
    }

    /// Starts every registered integration, recording each outcome.
    pub async fn start_all(&self) {
        let names: Vec<String> = self.integrations.lock().await.keys().cloned().collect();
        for name in names {
            self.start_one(&name).await;
        }
    }

    /// Stops every registered integration, recording each outcome.
    pub async fn stop_all(&self) {
        let names: Vec<String> = self.integrations.lock().await.keys().cloned().collect();
        for name in names {
            self.stop_one(&name).await;
        }
    }

    /// Runs a health check against every registered integration, updating
    /// its recorded status.
    pub async fn health_check(&self) {
        let entries: Vec<(String, Arc<dyn Integration>)> = {
            let integrations = self.integrations.lock().await;
            integrations
                .iter()
                .map(|(name, managed)| (name.clone(), Arc::clone(&managed.integration)))
                .collect()
        };
        for (name, integration) in entries {
            let status = integration.health().await;
            let mut integrations = self.integrations.lock().await;
            if let Some(managed) = integrations.get_mut(&name) {
                managed.last_status = status;
            }
        }
    }

    /// Returns the last observed status of every registered integration.
    pub async fn get_status_dashboard(&self) -> HashMap<String, HealthStatus> {
        let integrations = self.integrations.lock().await;
        integrations
            .iter()
            .map(|(name, managed)| (name.clone(), managed.last_status))
            .collect()
    }

    /// Runs one auto-reconnect sweep: any integration last observed
    /// `Disconnected` or `Error` has its `start` retried, and on success a
    /// `service.reconnected` event is emitted.
    pub async fn reconnect_unhealthy(&self, now: Timestamp) {
        let unhealthy: Vec<String> = {
            let integrations = self.integrations.lock().await;
            integrations
                .iter()
                .filter(|(_, managed)| {
                    matches!(managed.last_status, HealthStatus::Disconnected | HealthStatus::Error)
                })
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in unhealthy {
            let reconnected = self.start_one(&name).await;
            if reconnected {
                self.event_hub
                    .emit_event(
                        HubEvent {
                            source: "integration_manager".to_string(),
                            event_type: "service.reconnected".to_string(),
                            timestamp: now,
                            data: json!({ "integration": name }),
                            metadata: None,
                            priority: EventPriority::Normal,
                        },
                        now,
                    )
                    .await;
            }
        }
    }

    /// Spawns the background auto-reconnect loop, ticking every
    /// [`RECONNECT_INTERVAL`] until the returned handle is aborted.
    pub fn spawn_reconnect_loop(self: &Arc<Self>, now_fn: fn() -> Timestamp) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(RECONNECT_INTERVAL).await;
                manager.reconnect_unhealthy(now_fn()).await;
            }
        })
    }

    async fn start_one(&self, name: &str) -> bool {
        let integration = {
            let integrations = self.integrations.lock().await;
            integrations.get(name).map(|managed| Arc::clone(&managed.integration))
        };
        let Some(integration) = integration else {
            return false;
        };
        let outcome = integration.start().await;
        let status = match outcome {
            Ok(()) => {
                info!(integration = %name, "integration started");
                HealthStatus::Connected
            }
            Err(err) => {
                warn!(integration = %name, "integration failed to start: {err}");
                HealthStatus::Error
            }
        };
        let mut integrations = self.integrations.lock().await;
        if let Some(managed) = integrations.get_mut(name) {
            managed.last_status = status;
        }
        status == HealthStatus::Connected
    }

    async fn stop_one(&self, name: &str) {
        let integration = {
            let integrations = self.integrations.lock().await;
            integrations.get(name).map(|managed| Arc::clone(&managed.integration))
        };
        let Some(integration) = integration else {
            return;
        };
        if let Err(err) = integration.stop().await {
            warn!(integration = %name, "integration failed to stop cleanly: {err}");
        }
        let mut integrations = self.integrations.lock().await;
        if let Some(managed) = integrations.get_mut(name) {
            managed.last_status = HealthStatus::Disconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::event_hub::NullEventLogSink;

    struct FlakyIntegration {
        name: String,
        attempts: AtomicU32,
        succeeds_after: u32,
    }

    #[async_trait]
    impl Integration for FlakyIntegration {
        fn name(&self) -> &str {
            &self.name
        }

        async fn start(&self) -> Result<(), String> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.succeeds_after {
                Ok(())
            } else {
                Err("not yet".to_string())
            }
        }

        async fn stop(&self) -> Result<(), String> {
            Ok(())
        }

        async fn health(&self) -> HealthStatus {
            HealthStatus::Unknown
        }
    }

    #[tokio::test]
    async fn start_all_records_failure_status() {
        let hub = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let manager = IntegrationManager::new(hub);
        manager
            .register(Arc::new(FlakyIntegration {
                name: "email".to_string(),
                attempts: AtomicU32::new(0),
                succeeds_after: 5,
            }))
            .await;
        manager.start_all().await;
        let dashboard = manager.get_status_dashboard().await;
        assert_eq!(dashboard.get("email"), Some(&HealthStatus::Error));
    }

    #[tokio::test]
    async fn reconnect_sweep_emits_reconnected_event_on_recovery() {
        let hub = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let manager = Arc::new(IntegrationManager::new(Arc::clone(&hub)));
        manager
            .register(Arc::new(FlakyIntegration {
                name: "chat".to_string(),
                attempts: AtomicU32::new(0),
                succeeds_after: 2,
            }))
            .await;
        manager.start_all().await;
        assert_eq!(
            manager.get_status_dashboard().await.get("chat"),
            Some(&HealthStatus::Error)
        );

        manager.reconnect_unhealthy(Timestamp::from_unix_millis(10)).await;
        assert_eq!(
            manager.get_status_dashboard().await.get("chat"),
            Some(&HealthStatus::Connected)
        );

        hub.process_one_batch().await;
        let history = hub.get_event_history(Some("integration_manager"), 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, "service.reconnected");
    }

    #[tokio::test]
    async fn stop_all_marks_disconnected() {
        let hub = Arc::new(EventHub::new(Arc::new(NullEventLogSink)));
        let manager = IntegrationManager::new(hub);
        manager
            .register(Arc::new(FlakyIntegration {
                name: "sheets".to_string(),
                attempts: AtomicU32::new(0),
                succeeds_after: 1,
            }))
            .await;
        manager.start_all().await;
        manager.stop_all().await;
        assert_eq!(
            manager.get_status_dashboard().await.get("sheets"),
            Some(&HealthStatus::Disconnected)
        );
    }
}
