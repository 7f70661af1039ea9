//! Session-scoped event fan-out with gap-free catch-up for reconnecting
//! subscribers.
//!
//! Registration happens before the transcript is read, so an utterance
//! appended concurrently shows up either in the replay or in the live
//! channel (or both, in which case the live copy is dropped by sequence).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use debate_core::Utterance;
use events::{Event, EventBus, EventEnvelope};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{DeliveryError, StoreError};
use crate::transcript::TranscriptStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub heartbeat_interval_secs: u64,
    /// Per-subscriber buffer; a subscriber that falls this far behind is pruned.
    pub buffer_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 15,
            buffer_size: 1024,
        }
    }
}

impl HubConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

/// Public view of one registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SubscriberInfo {
    pub id: Uuid,
    pub session_id: Uuid,
    pub last_sequence: u64,
    pub live: bool,
    pub connected_at: DateTime<Utc>,
}

struct SubscriberSlot {
    sender: mpsc::Sender<EventEnvelope>,
    acked: Arc<AtomicU64>,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<Uuid, SubscriberSlot>,
    terminal: Option<EventEnvelope>,
}

#[derive(Clone)]
pub struct SessionHub {
    session_id: Uuid,
    store: Arc<dyn TranscriptStore>,
    bus: Option<EventBus>,
    config: HubConfig,
    state: Arc<Mutex<HubState>>,
}

impl SessionHub {
    pub fn new(session_id: Uuid, store: Arc<dyn TranscriptStore>, config: HubConfig) -> Self {
        Self {
            session_id,
            store,
            bus: None,
            config,
            state: Arc::new(Mutex::new(HubState::default())),
        }
    }

    /// Forward every published event to a process-wide bus as well.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber and prepare its catch-up from `last_seen`
    /// (0 or `None` replays the whole transcript).
    pub async fn subscribe(&self, last_seen: Option<u64>) -> Result<Subscription, StoreError> {
        let id = Uuid::new_v4();
        let last_seen = last_seen.unwrap_or(0);
        let (sender, rx) = mpsc::channel(self.config.buffer_size.max(1));
        let acked = Arc::new(AtomicU64::new(last_seen));

        let terminal = {
            let mut state = self.lock();
            state.subscribers.insert(
                id,
                SubscriberSlot {
                    sender,
                    acked: Arc::clone(&acked),
                    connected_at: Utc::now(),
                },
            );
            state.terminal.clone()
        };

        let history = match self.read_history(last_seen).await {
            Ok(history) => history,
            Err(e) => {
                self.unsubscribe(id);
                return Err(e);
            }
        };
        let (catchup, replayed_upto) = history;

        debug!(
            session_id = %self.session_id,
            subscriber_id = %id,
            last_seen,
            catchup = catchup.len(),
            "Subscriber registered"
        );

        Ok(Subscription {
            id,
            session_id: self.session_id,
            hub: self.clone(),
            catchup: catchup.into(),
            catchup_done: false,
            replayed_upto,
            terminal_on_connect: terminal,
            rx,
            heartbeat: self.config.heartbeat_interval(),
            acked,
            finished: false,
        })
    }

    async fn read_history(&self, last_seen: u64) -> Result<(Vec<Utterance>, u64), StoreError> {
        let history = self.store.history(self.session_id, last_seen).await?;
        let replayed_upto = match history.last() {
            Some(last) => last.sequence,
            // A cursor beyond the transcript must not hide future utterances.
            None => last_seen.min(self.store.last_sequence(self.session_id).await?),
        };
        Ok((history, replayed_upto))
    }

    /// Deliver to every live subscriber; broken or saturated ones are pruned.
    pub fn publish(&self, event: Event) -> EventEnvelope {
        let envelope = EventEnvelope::new(self.session_id, event);

        {
            let mut state = self.lock();
            if envelope.event.is_terminal() {
                state.terminal = Some(envelope.clone());
            }

            let session_id = self.session_id;
            state.subscribers.retain(|id, slot| {
                let error = match slot.sender.try_send(envelope.clone()) {
                    Ok(()) => return true,
                    Err(TrySendError::Closed(_)) => DeliveryError::Closed(*id),
                    Err(TrySendError::Full(_)) => DeliveryError::Full(*id),
                };
                warn!(
                    session_id = %session_id,
                    subscriber_id = %id,
                    error = %error,
                    "Pruning subscriber"
                );
                false
            });
        }

        if let Some(bus) = &self.bus {
            bus.publish(envelope.clone());
        }

        envelope
    }

    /// Idempotent; returns whether the subscriber was still registered.
    pub fn unsubscribe(&self, subscriber_id: Uuid) -> bool {
        let removed = self.lock().subscribers.remove(&subscriber_id).is_some();
        if removed {
            debug!(
                session_id = %self.session_id,
                subscriber_id = %subscriber_id,
                "Subscriber removed"
            );
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        let state = self.lock();
        let mut infos: Vec<_> = state
            .subscribers
            .iter()
            .map(|(id, slot)| SubscriberInfo {
                id: *id,
                session_id: self.session_id,
                last_sequence: slot.acked.load(Ordering::Relaxed),
                live: !slot.sender.is_closed(),
                connected_at: slot.connected_at,
            })
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    pub fn is_terminal(&self) -> bool {
        self.lock().terminal.is_some()
    }
}

impl std::fmt::Debug for SessionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHub")
            .field("session_id", &self.session_id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// One observer's view of a session: replay, then live events, with
/// heartbeats while idle. Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    session_id: Uuid,
    hub: SessionHub,
    catchup: VecDeque<Utterance>,
    catchup_done: bool,
    replayed_upto: u64,
    terminal_on_connect: Option<EventEnvelope>,
    rx: mpsc::Receiver<EventEnvelope>,
    heartbeat: Duration,
    acked: Arc<AtomicU64>,
    finished: bool,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Highest utterance sequence handed to this subscriber.
    pub fn last_sequence(&self) -> u64 {
        self.acked.load(Ordering::Relaxed)
    }

    fn envelope(&self, event: Event) -> EventEnvelope {
        EventEnvelope::new(self.session_id, event)
    }

    /// Live events already covered by the replay.
    fn is_stale(&self, event: &Event) -> bool {
        match event {
            Event::TurnComplete { utterance } => utterance.sequence <= self.replayed_upto,
            Event::TurnToken { sequence, .. } => *sequence <= self.replayed_upto,
            _ => false,
        }
    }

    /// Next event, or `None` once the session has ended or the subscriber
    /// was pruned.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if self.finished {
            return None;
        }

        if let Some(utterance) = self.catchup.pop_front() {
            self.acked.store(utterance.sequence, Ordering::Relaxed);
            return Some(self.envelope(Event::CatchupUtterance { utterance }));
        }

        if !self.catchup_done {
            self.catchup_done = true;
            return Some(self.envelope(Event::CatchupComplete {
                last_sequence: self.replayed_upto,
            }));
        }

        if let Some(terminal) = self.terminal_on_connect.take() {
            self.finished = true;
            return Some(terminal);
        }

        loop {
            let heartbeat = self.heartbeat;
            let received = tokio::select! {
                received = self.rx.recv() => Some(received),
                _ = tokio::time::sleep(heartbeat) => None,
            };

            let Some(received) = received else {
                return Some(self.envelope(Event::Heartbeat));
            };
            let Some(envelope) = received else {
                self.finished = true;
                return None;
            };

            if self.is_stale(&envelope.event) {
                continue;
            }
            if let Some(sequence) = envelope.event.utterance_sequence() {
                self.acked.store(sequence, Ordering::Relaxed);
            }
            if envelope.event.is_terminal() {
                self.finished = true;
            }
            return Some(envelope);
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .next()
                .await
                .map(|envelope| (envelope, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
