use async_trait::async_trait;
use dashmap::DashMap;
use roster_protocol::events::PresencePayload;
use roster_protocol::frames::EventFrame;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("broadcast unavailable: {0}")]
    Unavailable(String),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Publish/subscribe fan-out keyed by event id.
///
/// Frames are JSON strings. Publishing to a channel nobody listens to is
/// not an error.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Deliver `frame` to every current subscriber of `channel`.
    /// Returns how many subscribers it reached.
    async fn publish(&self, channel: &str, frame: &EventFrame) -> Result<usize, BroadcastError>;

    /// Join `channel`. Remaining subscribers get a `presence` update.
    fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, BroadcastError>;

    /// Leave `channel`. Remaining subscribers get a `presence` update.
    fn unsubscribe(&self, channel: &str, rx: broadcast::Receiver<String>);

    fn subscriber_count(&self, channel: &str) -> usize;

    /// Channels with at least one subscriber.
    fn channel_count(&self) -> usize;
}

/// In-process broadcaster: one tokio broadcast stream per event channel.
///
/// A receiver that falls more than `capacity` frames behind gets `Lagged`
/// and must be resynced from a fresh snapshot.
pub struct ChannelHub {
    channels: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, channel: &str) -> Option<broadcast::Sender<String>> {
        self.channels.get(channel).map(|tx| tx.clone())
    }

    fn announce_presence(&self, channel: &str) {
        let Some(tx) = self.sender(channel) else {
            return;
        };
        let payload = PresencePayload {
            subscription_count: tx.receiver_count(),
        };
        match serde_json::to_string(&payload.to_frame()) {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(e) => warn!(channel, error = %e, "presence encoding failed"),
        }
    }
}

#[async_trait]
impl Broadcaster for ChannelHub {
    async fn publish(&self, channel: &str, frame: &EventFrame) -> Result<usize, BroadcastError> {
        let json = serde_json::to_string(frame)?;
        let Some(tx) = self.sender(channel) else {
            debug!(channel, event = %frame.event, "no subscribers");
            return Ok(0);
        };
        // Err only means every receiver left in the meantime.
        Ok(tx.send(json).unwrap_or(0))
    }

    fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, BroadcastError> {
        // Subscribing under the entry lock keeps `unsubscribe` from dropping
        // the sender between lookup and subscribe.
        let rx = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        self.announce_presence(channel);
        Ok(rx)
    }

    fn unsubscribe(&self, channel: &str, rx: broadcast::Receiver<String>) {
        drop(rx);
        self.channels
            .remove_if(channel, |_, tx| tx.receiver_count() == 0);
        self.announce_presence(channel);
    }

    fn subscriber_count(&self, channel: &str) -> usize {
        self.sender(channel).map_or(0, |tx| tx.receiver_count())
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
