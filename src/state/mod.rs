pub mod hub;
pub mod match_session;
pub mod question;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{dao::match_store::MatchStore, error::ServiceError};

pub use self::hub::{ChannelHub, ChannelRegistry};

/// Shared handle to the relay/result-store state.
pub type SharedState = Arc<AppState>;

/// Frames buffered per relay subscriber before it is considered lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Central server state: match channel hubs and the result store handle.
pub struct AppState {
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    channels: ChannelRegistry,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The server starts in degraded mode until a result store is installed.
    pub fn new() -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            match_store: RwLock::new(None),
            channels: ChannelRegistry::new(CHANNEL_CAPACITY),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current result store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the result store or fail with [`ServiceError::Degraded`].
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a result store implementation and leave degraded mode.
    pub async fn set_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current result store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Hubs of the match channels relayed by this server.
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::match_store::memory::MemoryMatchStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new();
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_match_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .set_match_store(Arc::new(MemoryMatchStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_match_store().await.is_ok());

        state.clear_match_store().await;
        assert!(state.is_degraded());
        assert!(state.match_store().await.is_none());
    }
}
