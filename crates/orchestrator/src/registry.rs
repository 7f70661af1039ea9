//! Process-wide table of running and recently finished sessions.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use debate_core::{Session, SessionConfig, Utterance};
use events::EventBus;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::intervention::{Intervention, InterventionHandler};
use crate::session_orchestrator::{SessionHandle, SessionOrchestrator, SessionServices};
use crate::transcript::TranscriptStore;

struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<Session>,
}

/// Owns one loop per live session and hands out handles to them.
#[derive(Clone)]
pub struct SessionRegistry {
    services: Arc<SessionServices>,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new(services: SessionServices) -> Self {
        Self {
            services: Arc::new(services),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn services(&self) -> &SessionServices {
        &self.services
    }

    pub fn store(&self) -> Arc<dyn TranscriptStore> {
        Arc::clone(&self.services.store)
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.services.bus.as_ref()
    }

    pub fn interventions(&self) -> InterventionHandler {
        InterventionHandler::new(self.clone())
    }

    /// Validate the configuration, record the session and spawn its loop.
    pub async fn start(&self, config: SessionConfig) -> Result<SessionHandle> {
        config.validate()?;
        let session = Session::new(config);

        if let Some(repository) = &self.services.repository {
            repository.create(&session).await?;
        }

        let session_id = session.id;
        let (handle, task) = SessionOrchestrator::spawn(session, &self.services);
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                session_id,
                SessionEntry {
                    handle: handle.clone(),
                    task,
                },
            );

        info!(session_id = %session_id, "Session registered");
        Ok(handle)
    }

    pub fn get(&self, session_id: Uuid) -> Result<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .map(|entry| entry.handle.clone())
            .ok_or(OrchestratorError::SessionNotFound(session_id))
    }

    pub fn snapshot(&self, session_id: Uuid) -> Result<Session> {
        self.get(session_id).map(|handle| handle.snapshot())
    }

    /// Snapshot of a loaded session, falling back to the persisted record.
    pub async fn find(&self, session_id: Uuid) -> Result<Session> {
        if let Ok(session) = self.snapshot(session_id) {
            return Ok(session);
        }
        match &self.services.repository {
            Some(repository) => repository
                .find_by_id(session_id)
                .await?
                .ok_or(OrchestratorError::SessionNotFound(session_id)),
            None => Err(OrchestratorError::SessionNotFound(session_id)),
        }
    }

    /// All known sessions, newest first.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: HashMap<Uuid, Session> = match &self.services.repository {
            Some(repository) => repository
                .find_all()
                .await?
                .into_iter()
                .map(|s| (s.id, s))
                .collect(),
            None => HashMap::new(),
        };

        for entry in self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            let snapshot = entry.handle.snapshot();
            sessions.insert(snapshot.id, snapshot);
        }

        let mut sessions: Vec<Session> = sessions.into_values().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Utterances after `after_sequence` for a known session.
    pub async fn history(&self, session_id: Uuid, after_sequence: u64) -> Result<Vec<Utterance>> {
        self.find(session_id).await?;
        Ok(self.services.store.history(session_id, after_sequence).await?)
    }

    /// Drop finished sessions nobody is watching. Returns how many went.
    ///
    /// Without a session repository a reaped session can no longer be
    /// found, so its transcript is released from the store as well.
    pub fn reap(&self) -> usize {
        let mut reaped = Vec::new();
        let remaining = {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            sessions.retain(|id, entry| {
                let idle = entry.task.is_finished()
                    && entry.handle.snapshot().status.is_terminal()
                    && entry.handle.hub().subscriber_count() == 0;
                if idle {
                    reaped.push(*id);
                }
                !idle
            });
            sessions.len()
        };

        if self.services.repository.is_none() {
            for id in &reaped {
                self.services.store.forget(*id);
            }
        }
        if !reaped.is_empty() {
            info!(reaped = reaped.len(), remaining, "Reaped finished sessions");
        }
        reaped.len()
    }

    /// Call [`reap`](Self::reap) every `every` until `cancel` fires.
    pub fn spawn_reaper(&self, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.reap();
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every running session and wait for the loops to exit.
    pub async fn shutdown(&self, reason: &str) {
        let entries: Vec<SessionEntry> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        for entry in entries {
            if !entry.handle.snapshot().status.is_terminal() {
                let stop = Intervention::Stop {
                    reason: Some(reason.to_string()),
                };
                if let Err(e) = InterventionHandler::dispatch(&entry.handle, stop) {
                    warn!(session_id = %entry.handle.id(), error = %e, "Could not stop session");
                }
            }
            if let Err(e) = entry.task.await {
                warn!(session_id = %entry.handle.id(), error = %e, "Session task panicked");
            }
        }
    }
}
