use dashmap::DashMap;
use tokio::sync::broadcast;

/// Fan-out hub for a single match channel.
///
/// Frames are carried as raw JSON text so the hub never needs to re-encode
/// what a peer published.
pub struct ChannelHub {
    sender: broadcast::Sender<String>,
}

impl ChannelHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent frames.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// Send a frame to all current subscribers, returning how many received it.
    pub fn broadcast(&self, frame: String) -> usize {
        self.sender.send(frame).unwrap_or(0)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Registry of channel hubs keyed by match identifier.
///
/// Hubs are created on first subscription and pruned once their last
/// subscriber is gone.
pub struct ChannelRegistry {
    hubs: DashMap<String, ChannelHub>,
    capacity: usize,
}

impl ChannelRegistry {
    /// Build an empty registry whose hubs buffer up to `capacity` frames per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            hubs: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to `channel`, creating its hub when needed.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.hubs
            .entry(channel.to_string())
            .or_insert_with(|| ChannelHub::new(self.capacity))
            .subscribe()
    }

    /// Publish a frame on `channel`; returns the number of subscribers reached.
    pub fn broadcast(&self, channel: &str, frame: String) -> usize {
        match self.hubs.get(channel) {
            Some(hub) => hub.broadcast(frame),
            None => 0,
        }
    }

    /// Drop the hub of `channel` if nobody listens to it anymore.
    pub fn release(&self, channel: &str) {
        self.hubs
            .remove_if(channel, |_, hub| hub.subscriber_count() == 0);
    }

    /// Tear down the hub of `channel`, ending every subscriber's stream.
    pub fn close(&self, channel: &str) {
        self.hubs.remove(channel);
    }

    /// Tear down every hub.
    pub fn close_all(&self) {
        self.hubs.clear();
    }

    /// Number of subscribers currently attached to `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.hubs
            .get(channel)
            .map(|hub| hub.subscriber_count())
            .unwrap_or(0)
    }

    /// Number of channels with a live hub.
    pub fn channel_count(&self) -> usize {
        self.hubs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_reach_every_subscriber_of_the_channel_only() {
        let registry = ChannelRegistry::new(8);
        let mut first = registry.subscribe("match-1");
        let mut second = registry.subscribe("match-1");
        let mut other = registry.subscribe("match-2");

        assert_eq!(registry.broadcast("match-1", "hello".into()), 2);

        assert_eq!(first.recv().await.unwrap(), "hello");
        assert_eq!(second.recv().await.unwrap(), "hello");
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn release_prunes_only_idle_hubs() {
        let registry = ChannelRegistry::new(8);
        let receiver = registry.subscribe("match-1");
        registry.release("match-1");
        assert_eq!(registry.channel_count(), 1);

        drop(receiver);
        registry.release("match-1");
        assert_eq!(registry.channel_count(), 0);
        assert_eq!(registry.broadcast("match-1", "late".into()), 0);
    }

    #[tokio::test]
    async fn closing_a_channel_ends_its_streams() {
        let registry = ChannelRegistry::new(8);
        let mut receiver = registry.subscribe("match-1");
        registry.close("match-1");
        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
