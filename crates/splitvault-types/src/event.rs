//! Engine events for the external notification / activity-log sink.
//!
//! Every completed mutation (and every PIN failure) emits one event.
//! Delivery is fire-and-forget: a sink that drops events never affects the
//! financial operation that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// One activity event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineEvent {
    pub user_id: UserId,
    /// e.g. `transfer_completed`, `room_unlocked`, `pin_failed`.
    pub action: String,
    /// e.g. `transaction`, `room`, `plan`.
    pub resource_type: String,
    /// Stringified id of the affected resource.
    pub resource_id: String,
    /// Free-form extra detail.
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    #[must_use]
    pub fn new(
        user_id: UserId,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl ToString,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.to_string(),
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// External event sink boundary.
///
/// Implementations must be infallible from the engine's perspective —
/// delivery problems are the sink's concern.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops everything.
#[derive(Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Sink that buffers events in memory. Used by tests and local tooling.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Events with the given action, in emission order.
    #[must_use]
    pub fn with_action(&self, action: &str) -> Vec<EngineEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_collects() {
        let sink = MemorySink::new();
        let user = UserId::new();
        sink.emit(EngineEvent::new(user, "transfer_completed", "transaction", "t1"));
        sink.emit(
            EngineEvent::new(user, "room_unlocked", "room", "r1")
                .with_metadata(serde_json::json!({"amount": "110"})),
        );

        assert_eq!(sink.events().len(), 2);
        let unlocks = sink.with_action("room_unlocked");
        assert_eq!(unlocks.len(), 1);
        assert_eq!(unlocks[0].resource_id, "r1");
        assert_eq!(unlocks[0].metadata["amount"], "110");
    }

    #[test]
    fn noop_sink_drops() {
        let sink = NoopSink;
        sink.emit(EngineEvent::new(UserId::new(), "x", "y", "z"));
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = EngineEvent::new(UserId::new(), "topup_completed", "transaction", "t9")
            .with_metadata(serde_json::json!({"amount": "5000"}));
        let json = serde_json::to_string(&event).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, "topup_completed");
        assert_eq!(back.metadata["amount"], "5000");
    }
}
