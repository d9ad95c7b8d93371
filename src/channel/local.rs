use crate::channel::{LiveChannel, Subscription};
use crate::errors::PalaverResult;
use crate::model::ChannelEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// In-process live-channel transport: a topic map fanning events out to
/// each subscriber over an unbounded channel. The test and demo transport;
/// a real deployment substitutes a websocket-backed implementation behind
/// the same trait.
#[derive(Default)]
pub struct LocalBroker {
    topics: Mutex<HashMap<String, Vec<(Uuid, mpsc::UnboundedSender<ChannelEvent>)>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every open subscription on `topic`. Returns how
    /// many subscribers received it.
    pub fn publish(&self, topic: &str, event: &ChannelEvent) -> usize {
        let topics = self.topics.lock().expect("broker lock poisoned");
        let Some(subscribers) = topics.get(topic) else {
            return 0;
        };
        let mut delivered = 0;
        for (_, sender) in subscribers {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Decode a raw event-name + payload pair (the shape a websocket
    /// transport hands over) and deliver it. A malformed unit is rejected
    /// whole and reaches nobody.
    pub fn publish_raw(
        &self,
        topic: &str,
        event: &str,
        payload: &serde_json::Value,
    ) -> PalaverResult<usize> {
        let event = ChannelEvent::parse(event, payload)?;
        Ok(self.publish(topic, &event))
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .expect("broker lock poisoned")
            .get(topic)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl LiveChannel for LocalBroker {
    async fn subscribe(&self, topic: &str) -> PalaverResult<Subscription> {
        let (sender, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.topics
            .lock()
            .expect("broker lock poisoned")
            .entry(topic.to_string())
            .or_default()
            .push((id, sender));
        debug!("subscribed {} to {}", id, topic);
        Ok(Subscription::new(id, topic, events))
    }

    async fn unsubscribe(&self, subscription: Subscription) -> PalaverResult<()> {
        let mut topics = self.topics.lock().expect("broker lock poisoned");
        if let Some(subscribers) = topics.get_mut(subscription.topic()) {
            subscribers.retain(|(id, _)| *id != subscription.id());
            if subscribers.is_empty() {
                topics.remove(subscription.topic());
            }
        }
        debug!("unsubscribed {} from {}", subscription.id(), subscription.topic());
        Ok(())
    }
}
