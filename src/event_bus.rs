//! Broadcast hub for migration events: a `tokio::sync::broadcast` channel
//! plus a small `EventSink` trait for pluggable observers. No colorized
//! formatting here — the one built-in sink logs through `tracing`.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::protocol::MigrationEvent;

const DEFAULT_CAPACITY: usize = 1024;

pub trait EventSink: Send + Sync {
    fn handle(&self, event: &MigrationEvent);
}

/// Logs every migration event at `info` level via `tracing`.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn handle(&self, event: &MigrationEvent) {
        tracing::info!(?event, "migration event");
    }
}

pub struct EventBus {
    sender: broadcast::Sender<MigrationEvent>,
}

impl EventBus {
    /// Builds a bus and attaches the default `TracingSink` observer.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity);
        let bus = Arc::new(Self { sender });
        bus.attach(TracingSink);
        bus
    }

    /// Spawns a task that forwards every published event to `sink` until the
    /// bus itself (and every other subscriber) is dropped.
    pub fn attach(&self, sink: impl EventSink + 'static) {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                sink.handle(&event);
            }
        });
    }

    pub fn publish(&self, event: MigrationEvent) {
        // No receivers is a normal, expected condition (no one subscribed yet).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MigrationEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let task_id = Uuid::new_v4();
        bus.publish(MigrationEvent::MigrationStarted { task_id });
        let received = rx.recv().await.unwrap();
        assert_eq!(received, MigrationEvent::MigrationStarted { task_id });
    }
}
