// crates/opsgate-reliability/src/lib.rs
// ============================================================================
// Crate: opsgate-reliability
// Description: Cross-cutting reliability fabric — event hub, circuit
//              breaker, retry queue, integration manager, and shared atomic
//              persistence.
// ============================================================================

//! Cross-cutting reliability primitives shared by the rest of the
//! workspace: an in-process event hub, a circuit breaker, a durable retry
//! queue, and an adapter lifecycle supervisor.

mod circuit_breaker;
mod event_hub;
mod integration_manager;
mod persistence;
mod retry_queue;

pub use circuit_breaker::BreakerConfig;
pub use circuit_breaker::BreakerError;
pub use circuit_breaker::CircuitBreaker;
pub use event_hub::EventHandler;
pub use event_hub::EventHub;
pub use event_hub::EventLogSink;
pub use event_hub::NullEventLogSink;
pub use event_hub::SubscriptionId;
pub use event_hub::BATCH_SIZE;
pub use event_hub::HISTORY_LIMIT;
pub use event_hub::INTER_BATCH_PAUSE;
pub use integration_manager::HealthStatus;
pub use integration_manager::Integration;
pub use integration_manager::IntegrationManager;
pub use integration_manager::RECONNECT_INTERVAL;
pub use persistence::load_snapshot;
pub use persistence::write_snapshot;
pub use persistence::PersistenceError;
pub use retry_queue::FailedOperation;
pub use retry_queue::RetryHandler;
pub use retry_queue::RetryItem;
pub use retry_queue::RetryQueue;
pub use retry_queue::BACKOFF_SCHEDULE;
