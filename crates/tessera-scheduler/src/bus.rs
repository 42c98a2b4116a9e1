//! In-process event bus.

use async_trait::async_trait;
use tessera_core::Result;
use tessera_core::events::Event;
use tessera_core::ports::{EventBus, EventStream};
use tokio::sync::broadcast;

/// Broadcast-backed bus for a single-process orchestrator.
///
/// Publishing never fails: an event with no subscribers is simply dropped,
/// the run does not depend on anyone listening.
pub struct MemoryEventBus {
    tx: broadcast::Sender<Event>,
}

impl MemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        let _ = self.tx.send(event);
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream> {
        let rx = self.tx.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    // A slow subscriber misses events rather than stalling
                    // publishers.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tessera_core::events::{Event, MergePayload};
    use tessera_core::ids::RunId;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = MemoryEventBus::default();
        let mut stream = bus.subscribe().await.unwrap();

        let run_id = RunId::new();
        bus.publish(Event::MergeStarted(MergePayload { run_id }))
            .await
            .unwrap();

        let event = stream.next().await.unwrap();
        assert_eq!(event.subject(), format!("coverage.merge.started.{}", run_id));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = MemoryEventBus::default();
        bus.publish(Event::MergeStarted(MergePayload {
            run_id: RunId::new(),
        }))
        .await
        .unwrap();
    }
}
