//! Channel registry
//!
//! Holds one [`ChannelManager`] per topic. Created explicitly at startup and
//! passed to whatever needs a channel; there is no process-wide instance.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::manager::ChannelManager;
use crate::protocol::Topic;
use crate::settings::ChannelSettings;
use crate::transport::Transport;

/// One channel manager per topic
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: BTreeMap<Topic, ChannelManager>,
}

impl ChannelRegistry {
    /// Create a disconnected manager for every topic
    #[must_use]
    pub fn init(settings: &ChannelSettings, transport: Arc<dyn Transport>) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| {
                (
                    topic,
                    ChannelManager::from_settings(topic, Arc::clone(&transport), settings),
                )
            })
            .collect();
        info!(transport = transport.name(), "Channel registry initialized");
        Self { channels }
    }

    /// Manager for `topic`
    ///
    /// # Errors
    /// Returns [`Error::UnknownTopic`] if the topic has no manager.
    pub fn get(&self, topic: Topic) -> Result<&ChannelManager> {
        self.channels
            .get(&topic)
            .ok_or_else(|| Error::UnknownTopic(topic.to_string()))
    }

    /// Every manager, in topic order
    pub fn iter(&self) -> impl Iterator<Item = &ChannelManager> {
        self.channels.values()
    }

    /// Remove all handlers and disconnect every channel
    pub async fn teardown(&self) {
        futures::future::join_all(self.channels.values().map(|m| m.shutdown())).await;
        info!("Channel registry torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::state::ConnectionState;
    use shopsync_core::EventKind;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_registry_has_one_manager_per_topic() {
        let hub = MemoryTransport::new();
        let registry = ChannelRegistry::init(&ChannelSettings::default(), Arc::new(hub));
        assert_eq!(registry.iter().count(), 3);
        for topic in Topic::ALL {
            assert_eq!(registry.get(topic).unwrap().topic(), topic);
        }
    }

    #[tokio::test]
    async fn test_teardown_disconnects_everything() {
        let hub = MemoryTransport::new();
        let registry = ChannelRegistry::init(&ChannelSettings::default(), Arc::new(hub.clone()));
        let board = registry.get(Topic::Board).unwrap();
        board.on(EventKind::CardMoved, |_| {});
        assert_ok!(board.connect().await);
        assert_ok!(registry.get(Topic::Job).unwrap().connect().await);

        registry.teardown().await;

        for manager in registry.iter() {
            assert_eq!(manager.state(), ConnectionState::Disconnected);
        }
        assert_eq!(board.router().handler_count(EventKind::CardMoved), 0);
    }
}
