// Event Broadcaster
use tokio::sync::broadcast;
use tracing::trace;

use ava_protocol::TurnEvent;

/// Event broadcaster configuration
pub struct EventBroadcasterConfig {
    /// Channel capacity
    pub capacity: usize,
}

impl Default for EventBroadcasterConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Fan-out of turn events to any number of observers.
///
/// Emitting without subscribers is not an error; slow subscribers lag and
/// skip the oldest events.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<TurnEvent>,
}

impl EventBroadcaster {
    pub fn new(config: EventBroadcasterConfig) -> Self {
        let (tx, _) = broadcast::channel(config.capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: TurnEvent) {
        if self.tx.send(event).is_err() {
            trace!("no event subscribers");
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(EventBroadcasterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ava_protocol::ChatMessage;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let events = EventBroadcaster::default();
        let mut rx = events.subscribe();

        events.emit(TurnEvent::UserMessage(ChatMessage::assistant("m1", "one")));
        events.emit(TurnEvent::AssistantMessage(ChatMessage::assistant("m2", "two")));

        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::UserMessage(m) if m.id == "m1"));
        assert!(matches!(rx.recv().await.unwrap(), TurnEvent::AssistantMessage(m) if m.id == "m2"));
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        EventBroadcaster::default().emit(TurnEvent::UserMessage(ChatMessage::user("hi")));
    }
}
