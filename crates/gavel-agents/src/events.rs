//! Presentation event sink
//!
//! Events are broadcast to all subscribers (console, JSON stream, tests).
//! Publishing never blocks and succeeds with no subscribers.

use chrono::Utc;
use gavel_types::{AuctionEvent, ParticipantId};
use tokio::sync::broadcast;

/// Default buffer before slow subscribers start lagging
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct EventSink {
    sender: broadcast::Sender<AuctionEvent>,
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: AuctionEvent) {
        let _ = self.sender.send(event);
    }

    pub(crate) fn phase_changed(&self, participant: &ParticipantId, from: impl ToString, to: impl ToString) {
        self.emit(AuctionEvent::PhaseChanged {
            participant: participant.clone(),
            from: from.to_string(),
            to: to.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn dropped(&self, participant: &ParticipantId, reason: impl Into<String>) {
        self.emit(AuctionEvent::MessageDropped {
            participant: participant.clone(),
            reason: reason.into(),
            timestamp: Utc::now(),
        });
    }
}

/// Wait for the next sold or unsold event; `None` once the sink is gone
pub async fn next_outcome(events: &mut broadcast::Receiver<AuctionEvent>) -> Option<AuctionEvent> {
    loop {
        match events.recv().await {
            Ok(event) if event.is_outcome() => return Some(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::default();
        sink.dropped(&ParticipantId::seller(), "nobody listening");
    }

    #[tokio::test]
    async fn test_subscriber_receives() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();
        sink.phase_changed(&ParticipantId::seller(), "Idle", "AwaitingStart");
        match rx.recv().await.unwrap() {
            AuctionEvent::PhaseChanged { from, to, .. } => {
                assert_eq!(from, "Idle");
                assert_eq!(to, "AwaitingStart");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_next_outcome_skips_other_events() {
        let sink = EventSink::default();
        let mut rx = sink.subscribe();
        sink.dropped(&ParticipantId::seller(), "noise");
        sink.emit(AuctionEvent::AuctionUnsold {
            item: "Vase".to_string(),
            timestamp: Utc::now(),
        });
        assert!(matches!(
            next_outcome(&mut rx).await,
            Some(AuctionEvent::AuctionUnsold { .. })
        ));
    }
}
