//! Publish-only pub/sub contract (C7's output surface). The scheduler
//! publishes the per-channel wire message described in spec.md §6; a
//! downstream SSE relay (not part of this crate) would subscribe and fan out
//! to the transmitter fleet. No such subscriber is implemented here.
//!
//! The teacher wires exactly this shape for its price feed
//! (`AppState.tx_pricefeed: broadcast::Sender<OrderbookMsg>`); this module
//! generalizes it to one topic per logical channel instead of one global
//! feed, since the satellite queue has several independent broadcast
//! channels that must not see each other's traffic.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Fire-and-forget publication to a named topic. Failure (no subscribers,
/// channel closed) is not an error: the retransmission controller (C8) heals
/// orders that never got consumed downstream.
pub trait Broker: Send + Sync {
    fn publish(&self, topic: &str, payload: Value);
}

const TOPIC_CAPACITY: usize = 1024;

/// In-process broker backed by one [`broadcast::Sender`] per topic, created
/// lazily on first publish or subscribe. Suitable for a single coordinator
/// process; a multi-replica deployment would swap this for a real message
/// broker behind the same trait (see `BROKER_URI` in [`crate::settings`]).
#[derive(Default)]
pub struct InProcessBroker {
    topics: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl InProcessBroker {
    pub fn new() -> Self {
        InProcessBroker {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a topic, creating it if it does not exist yet. Intended
    /// for the (out-of-scope) SSE relay and for tests.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value> {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }
}

impl Broker for InProcessBroker {
    fn publish(&self, topic: &str, payload: Value) {
        let mut topics = self.topics.lock();
        let sender = topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0);
        // No subscribers is not an error: it just means nothing is currently
        // listening on this channel's topic.
        let _ = sender.send(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let broker = InProcessBroker::new();
        broker.publish("transmissions", json!({"uuid": "x"}));
    }

    #[test]
    fn subscriber_receives_published_payload() {
        let broker = InProcessBroker::new();
        let mut rx = broker.subscribe("gossip");
        broker.publish("gossip", json!({"uuid": "abc"}));
        let received = rx.try_recv().expect("message should be queued");
        assert_eq!(received, json!({"uuid": "abc"}));
    }

    #[test]
    fn topics_are_isolated() {
        let broker = InProcessBroker::new();
        let mut rx_a = broker.subscribe("transmissions");
        let _rx_b = broker.subscribe("gossip");
        broker.publish("gossip", json!({"uuid": "only-gossip"}));
        assert!(rx_a.try_recv().is_err());
    }
}
