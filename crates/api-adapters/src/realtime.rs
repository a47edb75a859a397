//! # Dialog hub
//!
//! One broadcast topic per dialog. Session endpoints subscribe when they
//! join; the outbox worker publishes through the `Broadcaster` port. A topic
//! lives as long as it has receivers: endpoints prune it when they leave,
//! and a broadcast that reaches nobody drops it too.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{Broadcaster, ChatEvent, Result};
use tokio::sync::broadcast;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 64;

pub struct DialogHub {
    topics: DashMap<Uuid, broadcast::Sender<ChatEvent>>,
    capacity: usize,
}

impl Default for DialogHub {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DialogHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` bounds how far a slow endpoint may lag before it skips.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Joins the dialog topic, creating it on first use.
    pub fn subscribe(&self, dialog_id: Uuid) -> broadcast::Receiver<ChatEvent> {
        self.topics
            .entry(dialog_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Forgets the topic once its last receiver is gone. A topic someone
    /// joined in the meantime is kept.
    pub fn prune(&self, dialog_id: Uuid) {
        self.topics
            .remove_if(&dialog_id, |_, sender| sender.receiver_count() == 0);
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn subscribers(&self, dialog_id: Uuid) -> usize {
        self.topics
            .get(&dialog_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broadcaster for DialogHub {
    async fn broadcast(&self, dialog_id: Uuid, event: &ChatEvent) -> Result<usize> {
        let sent = match self.topics.get(&dialog_id) {
            Some(sender) => sender.send(event.clone()).ok(),
            None => return Ok(0),
        };
        match sent {
            Some(receivers) => Ok(receivers),
            None => {
                self.prune(dialog_id);
                Ok(0)
            }
        }
    }
}
