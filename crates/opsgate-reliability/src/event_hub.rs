// crates/opsgate-reliability/src/event_hub.rs
// ============================================================================
// Module: Event Hub (L1)
// Description: In-process pub/sub with priority batching and an append-only
//              event log.
// Purpose: Fan HubEvents out to subscribers in priority order without
//          letting a slow or failing subscriber, or a failing log sink,
//          stall dispatch.
// Dependencies: opsgate-core, tokio, tracing
// ============================================================================

//! ## Overview
//! Events accumulate in a FIFO queue. A single batch-processor task drains
//! up to [`BATCH_SIZE`] events at a time, sorts them by priority descending
//! (stable on arrival order), and delivers to every subscriber of each
//! event's type concurrently. History is retained up to [`HISTORY_LIMIT`]
//! entries, oldest evicted first. The event log is appended to
//! asynchronously and its failures are logged but never block dispatch.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsgate_core::sort_batch_by_priority;
use opsgate_core::HubEvent;
use opsgate_core::Timestamp;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

/// Events drained and delivered per batch-processor tick.
pub const BATCH_SIZE: usize = 25;
/// Pause between batch-processor ticks when the queue is calm.
pub const INTER_BATCH_PAUSE: Duration = Duration::from_millis(50);
/// Maximum retained event-history entries.
pub const HISTORY_LIMIT: usize = 1000;

/// A sink that appends one JSON line per delivered event.
#[async_trait]
pub trait EventLogSink: Send + Sync {
    /// Appends one already-serialized JSON line.
    async fn append(&self, line: &str) -> Result<(), String>;
}

/// A no-op sink, used when no durable event log is configured.
#[derive(Debug, Default)]
pub struct NullEventLogSink;

#[async_trait]
impl EventLogSink for NullEventLogSink {
    async fn append(&self, _line: &str) -> Result<(), String> {
        Ok(())
    }
}

/// A subscriber invoked once per matching event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one delivered event. Errors are logged, not propagated.
    async fn handle(&self, event: &HubEvent);
}

/// Opaque handle returned by [`EventHub::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

struct HubState {
    queue: VecDeque<HubEvent>,
    subscribers: HashMap<String, Vec<Subscription>>,
    history: VecDeque<HubEvent>,
    next_subscription_id: u64,
}

impl HubState {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            subscribers: HashMap::new(),
            history: VecDeque::new(),
            next_subscription_id: 0,
        }
    }
}

/// In-process publish/subscribe hub with priority-ordered batch delivery.
pub struct EventHub {
    state: Arc<Mutex<HubState>>,
    log_sink: Arc<dyn EventLogSink>,
}

impl EventHub {
    /// Builds a hub with the given event-log sink (use [`NullEventLogSink`]
    /// if no durable log is wanted).
    #[must_use]
    pub fn new(log_sink: Arc<dyn EventLogSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::new())),
            log_sink,
        }
    }

    /// Registers `handler` for `event_type`, returning an id that can be
    /// passed to [`EventHub::unsubscribe`].
    pub async fn subscribe(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let mut state = self.state.lock().await;
        let id = SubscriptionId(state.next_subscription_id);
        state.next_subscription_id += 1;
        state
            .subscribers
            .entry(event_type.into())
            .or_default()
            .push(Subscription { id, handler });
        id
    }

    /// Removes a prior subscription. A no-op if the id is unknown or
    /// already removed.
    pub async fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state.lock().await;
        for subscribers in state.subscribers.values_mut() {
            subscribers.retain(|subscription| subscription.id != id);
        }
    }

    /// Enqueues `event`, stamping its timestamp, and returns the stamped
    /// copy. Delivery happens asynchronously on the batch-processor task.
    pub async fn emit_event(&self, mut event: HubEvent, now: Timestamp) -> HubEvent {
        event.timestamp = now;
        let mut state = self.state.lock().await;
        state.queue.push_back(event.clone());
        event
    }

    /// Returns up to `limit` of the most recent events, newest first.
    pub async fn get_event_history(&self, source: Option<&str>, limit: usize) -> Vec<HubEvent> {
        let state = self.state.lock().await;
        state
            .history
            .iter()
            .rev()
            .filter(|event| source.map_or(true, |s| event.source == s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns a snapshot of retained history matching the given filters.
    pub async fn filter_events(
        &self,
        source: Option<&str>,
        min_priority: Option<opsgate_core::EventPriority>,
    ) -> Vec<HubEvent> {
        let state = self.state.lock().await;
        state
            .history
            .iter()
            .filter(|event| source.map_or(true, |s| event.source == s))
            .filter(|event| min_priority.map_or(true, |min| event.priority >= min))
            .cloned()
            .collect()
    }

    /// Drains and delivers one batch immediately; used by tests and by the
    /// background loop in [`EventHub::spawn_batch_processor`].
    pub async fn process_one_batch(&self) {
        let batch = {
            let mut state = self.state.lock().await;
            let drain_count = BATCH_SIZE.min(state.queue.len());
            let mut batch: Vec<HubEvent> = state.queue.drain(..drain_count).collect();
            sort_batch_by_priority(&mut batch);
            for event in &batch {
                state.history.push_back(event.clone());
                while state.history.len() > HISTORY_LIMIT {
                    state.history.pop_front();
                }
            }
            batch
        };
        for event in &batch {
            self.deliver(event).await;
            self.log(event).await;
        }
    }

    async fn deliver(&self, event: &HubEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> = {
            let state = self.state.lock().await;
            state
                .subscribers
                .get(&event.event_type)
                .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
                .unwrap_or_default()
        };
        let deliveries = handlers.into_iter().map(|handler| {
            let event = event.clone();
            async move { handler.handle(&event).await }
        });
        futures_join_all(deliveries).await;
    }

    async fn log(&self, event: &HubEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                warn!("event log: failed to serialize event: {err}");
                return;
            }
        };
        if let Err(err) = self.log_sink.append(&line).await {
            warn!("event log: append failed, continuing dispatch: {err}");
        }
    }

    /// Spawns the background batch-processor loop, ticking forever until
    /// the returned handle is aborted or dropped.
    pub fn spawn_batch_processor(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                hub.process_one_batch().await;
                tokio::time::sleep(INTER_BATCH_PAUSE).await;
            }
        })
    }
}

/// A minimal `join_all` so this crate does not pull in the `futures` crate
/// for a single combinator.
async fn futures_join_all<I>(iter: I)
where
    I: IntoIterator,
    I::Item: std::future::Future<Output = ()>,
{
    let handles: Vec<_> = iter.into_iter().collect();
    for handle in handles {
        handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use opsgate_core::EventPriority;
    use serde_json::json;

    use super::*;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &HubEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event(event_type: &str, priority: EventPriority) -> HubEvent {
        HubEvent {
            source: "test".to_string(),
            event_type: event_type.to_string(),
            timestamp: Timestamp::from_unix_millis(0),
            data: json!({}),
            metadata: None,
            priority,
        }
    }

    #[tokio::test]
    async fn delivers_to_subscribed_handler() {
        let hub = EventHub::new(Arc::new(NullEventLogSink));
        let count = Arc::new(AtomicUsize::new(0));
        hub.subscribe("action:ready", Arc::new(CountingHandler { count: count.clone() }))
            .await;
        hub.emit_event(event("action:ready", EventPriority::High), Timestamp::from_unix_millis(1))
            .await;
        hub.process_one_batch().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribed_handler_receives_nothing() {
        let hub = EventHub::new(Arc::new(NullEventLogSink));
        let count = Arc::new(AtomicUsize::new(0));
        let id = hub
            .subscribe("action:ready", Arc::new(CountingHandler { count: count.clone() }))
            .await;
        hub.unsubscribe(id).await;
        hub.emit_event(event("action:ready", EventPriority::High), Timestamp::from_unix_millis(1))
            .await;
        hub.process_one_batch().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn history_respects_priority_descending_order_within_a_batch() {
        let hub = EventHub::new(Arc::new(NullEventLogSink));
        hub.emit_event(event("a", EventPriority::Low), Timestamp::from_unix_millis(1)).await;
        hub.emit_event(event("a", EventPriority::High), Timestamp::from_unix_millis(2)).await;
        hub.emit_event(event("a", EventPriority::Normal), Timestamp::from_unix_millis(3)).await;
        hub.process_one_batch().await;
        let history = hub.get_event_history(None, 10).await;
        let priorities: Vec<EventPriority> = history.iter().rev().map(|e| e.priority).collect();
        assert_eq!(
            priorities,
            vec![EventPriority::High, EventPriority::Normal, EventPriority::Low]
        );
    }

    #[tokio::test]
    async fn history_is_bounded_and_evicts_oldest() {
        let hub = EventHub::new(Arc::new(NullEventLogSink));
        for i in 0..(HISTORY_LIMIT + 10) {
            hub.emit_event(
                event("a", EventPriority::Normal),
                Timestamp::from_unix_millis(i as i64),
            )
            .await;
        }
        // Drain in multiple batches since BATCH_SIZE < HISTORY_LIMIT + 10.
        for _ in 0..((HISTORY_LIMIT + 10) / BATCH_SIZE + 1) {
            hub.process_one_batch().await;
        }
        let history = hub.get_event_history(None, HISTORY_LIMIT + 10).await;
        assert_eq!(history.len(), HISTORY_LIMIT);
    }
}
