// crates/opsgate-core/src/event.rs
// ============================================================================
// Module: Hub Event
// Description: The envelope published on the in-process Event Hub bus.
// Purpose: Define HubEvent and EventPriority, and priority-stable ordering.
// Dependencies: crate::time, serde, serde_json
// ============================================================================

//! ## Overview
//! `HubEvent` is what L1 (Event Hub) moves between producers and
//! subscribers. Within one delivery batch, events sort by priority
//! descending, stable on arrival order (insertion index), matching the
//! ordering guarantee in the concurrency model.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::time::Timestamp;

/// Delivery priority for a `HubEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    /// Deliver after `Normal` and `High` events in the same batch.
    Low,
    /// Deliver after `High` events in the same batch.
    Normal,
    /// Deliver first within a batch.
    High,
}

/// An event published on the Event Hub bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Emitting component or adapter name.
    pub source: String,
    /// Event type name, e.g. `action:ready`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the event was stamped by the hub.
    pub timestamp: Timestamp,
    /// Event payload.
    pub data: Value,
    /// Optional free-form metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Delivery priority.
    pub priority: EventPriority,
}

/// Sorts a batch of events by priority descending, stable on arrival order.
///
/// `events` is assumed to already be in arrival order; this performs a
/// stable sort so ties keep that order, matching the Event Hub's ordering
/// guarantee.
pub fn sort_batch_by_priority(events: &mut [HubEvent]) {
    events.sort_by(|a, b| b.priority.cmp(&a.priority));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::sort_batch_by_priority;
    use super::EventPriority;
    use super::HubEvent;
    use crate::time::Timestamp;

    fn event(source: &str, priority: EventPriority) -> HubEvent {
        HubEvent {
            source: source.to_string(),
            event_type: "test".to_string(),
            timestamp: Timestamp::from_unix_millis(0),
            data: json!({}),
            metadata: None,
            priority,
        }
    }

    #[test]
    fn sorts_high_before_normal_before_low_stably() {
        let mut batch = vec![
            event("a", EventPriority::Normal),
            event("b", EventPriority::High),
            event("c", EventPriority::Normal),
            event("d", EventPriority::Low),
        ];
        sort_batch_by_priority(&mut batch);
        let sources: Vec<&str> = batch.iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["b", "a", "c", "d"]);
    }
}
