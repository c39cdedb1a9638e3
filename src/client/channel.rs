//! Publish/subscribe seam between a match replica and whatever carries its
//! frames.

use std::sync::Arc;

use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::BoxStream,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    client::error::{PublishError, SubscriptionError},
    dto::wire::MatchEvent,
};

/// Pub/sub backend addressed by channel name.
///
/// Delivery is best effort to currently subscribed peers; publishers receive
/// their own frames back like any other subscriber.
pub trait PubSubTransport: Send + Sync {
    /// Join `channel`. Resolves once frames published afterwards are guaranteed to be delivered.
    fn subscribe(&self, channel: &str) -> BoxFuture<'static, Result<Subscription, SubscriptionError>>;

    /// Hand a frame to the backend without waiting for peers.
    fn publish(&self, channel: &str, frame: String) -> BoxFuture<'static, Result<(), PublishError>>;

    /// Release the channel resources held by `subscription`.
    fn unsubscribe(&self, subscription: Subscription) -> BoxFuture<'static, ()>;
}

/// Live membership of one channel, yielding raw frames.
pub struct Subscription {
    id: Uuid,
    channel: String,
    frames: BoxStream<'static, String>,
}

impl Subscription {
    /// Wrap a frame stream produced by a transport.
    pub fn new(channel: impl Into<String>, frames: BoxStream<'static, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            frames,
        }
    }

    /// Unique id of this subscription.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Channel this subscription listens to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next frame.
    pub async fn recv(&mut self) -> Result<String, SubscriptionError> {
        self.frames
            .next()
            .await
            .ok_or_else(|| SubscriptionError::Disconnected {
                channel: self.channel.clone(),
            })
    }

    /// Take a frame that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Result<Option<String>, SubscriptionError> {
        match self.frames.next().now_or_never() {
            Some(Some(frame)) => Ok(Some(frame)),
            Some(None) => Err(SubscriptionError::Disconnected {
                channel: self.channel.clone(),
            }),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Typed view of a match channel: JSON-encoded [`MatchEvent`] frames.
pub struct MatchChannel {
    transport: Arc<dyn PubSubTransport>,
    subscription: Subscription,
}

impl MatchChannel {
    /// Subscribe to the channel named after `match_id`.
    pub async fn join(
        transport: Arc<dyn PubSubTransport>,
        match_id: &str,
    ) -> Result<Self, SubscriptionError> {
        let subscription = transport.subscribe(match_id).await?;
        debug!(match_id, subscription = %subscription.id(), "joined match channel");
        Ok(Self {
            transport,
            subscription,
        })
    }

    /// Name of the joined channel.
    pub fn match_id(&self) -> &str {
        self.subscription.channel()
    }

    /// Publish an event on the channel.
    pub async fn publish(&self, event: &MatchEvent) -> Result<(), PublishError> {
        let frame = event.to_json()?;
        self.transport
            .publish(self.subscription.channel(), frame)
            .await
    }

    /// Wait for the next well-formed event; malformed frames are skipped.
    pub async fn next_event(&mut self) -> Result<MatchEvent, SubscriptionError> {
        loop {
            let frame = self.subscription.recv().await?;
            if let Some(event) = self.decode(&frame) {
                return Ok(event);
            }
        }
    }

    /// Take the next queued well-formed event without waiting.
    pub fn try_next_event(&mut self) -> Result<Option<MatchEvent>, SubscriptionError> {
        while let Some(frame) = self.subscription.try_recv()? {
            if let Some(event) = self.decode(&frame) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Unsubscribe and release the channel.
    pub async fn leave(self) {
        let match_id = self.subscription.channel().to_string();
        self.transport.unsubscribe(self.subscription).await;
        debug!(match_id = %match_id, "left match channel");
    }

    fn decode(&self, frame: &str) -> Option<MatchEvent> {
        match MatchEvent::from_json_str(frame) {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(
                    match_id = %self.subscription.channel(),
                    error = %err,
                    "skipping malformed frame"
                );
                None
            }
        }
    }
}
