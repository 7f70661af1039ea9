//! Process-wide event feed over a tokio broadcast channel.
//!
//! Session hubs forward every event here so the global SSE feed sees all
//! sessions in one stream. There is no replay: a lagging listener loses
//! events and has to reconnect through a session stream to catch up.

use std::collections::HashSet;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::EventEnvelope;

const FEED_CAPACITY: usize = 1000;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Fire and forget; with no listeners the envelope is dropped.
    pub fn publish(&self, envelope: EventEnvelope) {
        let _ = self.sender.send(envelope);
    }

    /// Only envelopes published after this call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Open global feed connections.
    pub fn listeners(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners())
            .finish()
    }
}

/// Which sessions a feed listener wants to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    sessions: Option<HashSet<Uuid>>,
}

impl FeedFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a comma-separated id list; malformed ids are skipped. `None`
    /// admits every session, an empty list admits none.
    pub fn from_query(session_ids: Option<&str>) -> Self {
        Self {
            sessions: session_ids.map(|list| {
                list.split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect()
            }),
        }
    }

    pub fn admits(&self, envelope: &EventEnvelope) -> bool {
        self.sessions
            .as_ref()
            .map_or(true, |ids| ids.contains(&envelope.session_id))
    }
}
