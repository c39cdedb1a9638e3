//! In-process pub/sub backend.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{StreamExt, future::BoxFuture};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::warn;

use crate::{
    client::{
        channel::{PubSubTransport, Subscription},
        error::{PublishError, SubscriptionError},
    },
    state::ChannelRegistry,
};

const LOCAL_CAPACITY: usize = 64;

/// Pub/sub backend living in the current process.
///
/// Every clone shares the same channels, so several [`MatchClient`]s in one
/// process can play against each other. Connectivity loss can be simulated
/// with [`LocalBroker::set_online`] and [`LocalBroker::disconnect_all`].
///
/// [`MatchClient`]: crate::client::controller::MatchClient
#[derive(Clone)]
pub struct LocalBroker {
    inner: Arc<BrokerInner>,
}

struct BrokerInner {
    channels: ChannelRegistry,
    online: AtomicBool,
}

impl LocalBroker {
    /// Create an online broker without channels.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                channels: ChannelRegistry::new(LOCAL_CAPACITY),
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Toggle reachability; offline brokers refuse subscriptions and publishes.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// End every live subscription, as if the backend dropped all connections.
    pub fn disconnect_all(&self) {
        self.inner.channels.close_all();
    }

    /// Number of subscribers currently attached to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.channels.subscriber_count(channel)
    }

    fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubTransport for LocalBroker {
    fn subscribe(&self, channel: &str) -> BoxFuture<'static, Result<Subscription, SubscriptionError>> {
        let broker = self.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            if !broker.is_online() {
                return Err(SubscriptionError::Unreachable {
                    channel,
                    reason: "local broker is offline".into(),
                });
            }

            let receiver = broker.inner.channels.subscribe(&channel);
            let lagging_channel = channel.clone();
            let frames = BroadcastStream::new(receiver)
                .filter_map(move |frame| {
                    let channel = lagging_channel.clone();
                    async move {
                        match frame {
                            Ok(frame) => Some(frame),
                            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                                warn!(channel = %channel, skipped, "local subscriber lagging; frames dropped");
                                None
                            }
                        }
                    }
                })
                .boxed();

            Ok(Subscription::new(channel, frames))
        })
    }

    fn publish(&self, channel: &str, frame: String) -> BoxFuture<'static, Result<(), PublishError>> {
        let broker = self.clone();
        let channel = channel.to_string();
        Box::pin(async move {
            if !broker.is_online() {
                return Err(PublishError::Unreachable {
                    channel,
                    reason: "local broker is offline".into(),
                });
            }
            broker.inner.channels.broadcast(&channel, frame);
            Ok(())
        })
    }

    fn unsubscribe(&self, subscription: Subscription) -> BoxFuture<'static, ()> {
        let broker = self.clone();
        Box::pin(async move {
            let channel = subscription.channel().to_string();
            drop(subscription);
            broker.inner.channels.release(&channel);
        })
    }
}
