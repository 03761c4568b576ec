//! Topic-keyed in-process event bus (C13).
//!
//! Grounded in the teacher's `astrid_events::bus::EventBus` (a
//! `tokio::sync::broadcast` wrapper), extended to be topic-keyed: a channel
//! is created lazily per topic on first `subscribe`/`publish`, and
//! `close_all_for_pattern` drops every channel whose topic starts with a
//! given prefix (used on session teardown to release `session-log/<id>` and
//! `interactive-log/<id>`).

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::event::Event;
use crate::topic::Topic;

/// Default per-topic channel capacity. A full subscriber buffer drops the
/// oldest event for that subscriber only — publish never blocks (§4.13).
pub const DEFAULT_BUF_SIZE: usize = 256;

/// A topic-keyed pub/sub bus.
#[derive(Default)]
pub struct EventBus {
    channels: RwLock<HashMap<Topic, broadcast::Sender<Event>>>,
}

impl EventBus {
    /// Build an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `topic`, creating its channel if this is the first
    /// subscriber. Returns a receiver; dropping it unsubscribes.
    #[must_use]
    pub fn subscribe(&self, topic: &Topic, buf_size: usize) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(buf_size.max(1)).0)
            .subscribe()
    }

    /// Publish `event` to `topic`. Non-blocking: if no channel exists yet
    /// (no subscriber has ever asked for this topic) the event is simply
    /// dropped, matching broadcast's "no receivers" behavior.
    pub fn publish(&self, topic: &Topic, event: Event) {
        let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(topic) else {
            trace!(topic = %topic, "publish with no subscribers, dropping");
            return;
        };
        if sender.send(event).is_err() {
            trace!(topic = %topic, "publish with no receivers, dropping");
        }
    }

    /// Drop every channel whose topic starts with `prefix`.
    ///
    /// Called on session finalize so `session-log/<id>` and
    /// `interactive-log/<id>` release their senders once no further events
    /// will be published.
    pub fn close_all_for_pattern(&self, prefix: &str) {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let before = channels.len();
        channels.retain(|topic, _| !topic.matches_prefix(prefix));
        let closed = before - channels.len();
        if closed > 0 {
            trace!(prefix, closed, "closed event bus channels");
        }
    }

    /// Number of distinct topics with at least one live channel.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drain `receiver` into an `Option<Event>`, logging and continuing past lag
/// the way the teacher's `EventReceiver::recv` does, instead of surfacing
/// `RecvError::Lagged` to callers.
pub async fn recv_lenient(receiver: &mut broadcast::Receiver<Event>) -> Option<Event> {
    loop {
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_then_receive() {
        let bus = EventBus::new();
        let topic = Topic::new("t1");
        let mut rx = bus.subscribe(&topic, DEFAULT_BUF_SIZE);
        bus.publish(&topic, Event::new("skill_start", json!({"a": 1})));
        let event = recv_lenient(&mut rx).await.unwrap();
        assert_eq!(event.name, "skill_start");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(&Topic::new("nobody-home"), Event::new("x", json!(null)));
    }

    #[tokio::test]
    async fn two_subscribers_both_receive() {
        let bus = EventBus::new();
        let topic = Topic::new("t1");
        let mut rx1 = bus.subscribe(&topic, DEFAULT_BUF_SIZE);
        let mut rx2 = bus.subscribe(&topic, DEFAULT_BUF_SIZE);
        bus.publish(&topic, Event::new("skill_end", json!({})));
        assert!(recv_lenient(&mut rx1).await.is_some());
        assert!(recv_lenient(&mut rx2).await.is_some());
    }

    #[tokio::test]
    async fn close_all_for_pattern_drops_matching_topics() {
        let bus = EventBus::new();
        let a = Topic::new("session-log/1");
        let b = Topic::new("session-log/2");
        let c = Topic::new("interactive-log/1");
        let _ra = bus.subscribe(&a, DEFAULT_BUF_SIZE);
        let _rb = bus.subscribe(&b, DEFAULT_BUF_SIZE);
        let _rc = bus.subscribe(&c, DEFAULT_BUF_SIZE);
        assert_eq!(bus.topic_count(), 3);

        bus.close_all_for_pattern("session-log/");
        assert_eq!(bus.topic_count(), 1);
    }

    #[tokio::test]
    async fn does_not_promise_cross_topic_ordering_but_is_fifo_per_subscriber() {
        let bus = EventBus::new();
        let topic = Topic::new("t1");
        let mut rx = bus.subscribe(&topic, DEFAULT_BUF_SIZE);
        bus.publish(&topic, Event::new("first", json!(1)));
        bus.publish(&topic, Event::new("second", json!(2)));
        assert_eq!(recv_lenient(&mut rx).await.unwrap().name, "first");
        assert_eq!(recv_lenient(&mut rx).await.unwrap().name, "second");
    }
}
