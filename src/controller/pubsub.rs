//! Topic-based fan-out of snapshots to every connected viewer

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Messages kept per topic for a viewer that falls behind; older ones are dropped.
pub const TOPIC_CAPACITY: usize = 16;

/// The two channels viewers can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Queue,
    State,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Queue => "queue",
            Topic::State => "state",
        }
    }
}

/// One published message as viewers receive it
#[derive(Clone, Debug, Serialize)]
pub struct Envelope {
    pub topic: Topic,
    pub published_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Sink the broadcaster publishes into.
///
/// Publishing is fire-and-forget: no acknowledgment, and nothing is retained
/// for topics nobody listens to.
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: Topic, payload: serde_json::Value);
}

/// In-process pub/sub hub with one broadcast channel per topic
#[derive(Clone)]
pub struct BroadcastHub {
    queue: broadcast::Sender<Arc<Envelope>>,
    state: broadcast::Sender<Arc<Envelope>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (queue, _) = broadcast::channel(TOPIC_CAPACITY);
        let (state, _) = broadcast::channel(TOPIC_CAPACITY);
        Self { queue, state }
    }

    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Arc<Envelope>> {
        self.sender(topic).subscribe()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Arc<Envelope>> {
        match topic {
            Topic::Queue => &self.queue,
            Topic::State => &self.state,
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for BroadcastHub {
    fn publish(&self, topic: Topic, payload: serde_json::Value) {
        let envelope = Arc::new(Envelope {
            topic,
            published_at: Utc::now(),
            payload,
        });
        // Err only means there is no subscriber right now.
        if let Ok(receivers) = self.sender(topic).send(envelope) {
            tracing::trace!(topic = topic.as_str(), receivers, "Snapshot published");
        }
    }
}
