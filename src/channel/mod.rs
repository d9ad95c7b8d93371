pub mod local;

pub use local::LocalBroker;

use crate::errors::PalaverResult;
use crate::model::ChannelEvent;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

/// An open subscription to one conversation's live topic.
///
/// The handle is owned by whoever subscribed and must be passed back to
/// [`LiveChannel::unsubscribe`] to close it — there is no process-wide
/// channel singleton. The event receiver is taken out once by the consumer
/// pump; the handle itself stays behind for the eventual unsubscribe.
pub struct Subscription {
    id: Uuid,
    topic: String,
    events: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
}

impl Subscription {
    pub fn new(id: Uuid, topic: impl Into<String>, events: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self {
            id,
            topic: topic.into(),
            events: Some(events),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Take the event stream out of the handle. Returns None on a second
    /// call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelEvent>> {
        self.events.take()
    }
}

/// Transport for per-conversation live topics. Authorization (the bearer
/// exchange the backend requires for private topics) is the transport
/// implementation's concern, not modeled here.
#[async_trait]
pub trait LiveChannel: Send + Sync {
    async fn subscribe(&self, topic: &str) -> PalaverResult<Subscription>;
    async fn unsubscribe(&self, subscription: Subscription) -> PalaverResult<()>;
}
