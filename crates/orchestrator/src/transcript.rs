//! Ordered, append-only utterance storage per session.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use db::UtteranceRepository;
use debate_core::Utterance;
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Append atomically. The sequence must be exactly one past the last.
    async fn append(&self, utterance: &Utterance) -> Result<(), StoreError>;

    /// Utterances with `sequence > after_sequence`, ascending.
    async fn history(
        &self,
        session_id: Uuid,
        after_sequence: u64,
    ) -> Result<Vec<Utterance>, StoreError>;

    async fn last_sequence(&self, session_id: Uuid) -> Result<u64, StoreError>;

    /// Release a session's transcript once nothing can read it again.
    /// Durable stores keep it.
    fn forget(&self, _session_id: Uuid) {}
}

#[derive(Default)]
pub struct InMemoryTranscriptStore {
    sessions: RwLock<HashMap<Uuid, Vec<Utterance>>>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn append(&self, utterance: &Utterance) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let transcript = sessions.entry(utterance.session_id).or_default();

        let expected = transcript.last().map_or(1, |u| u.sequence + 1);
        if utterance.sequence != expected {
            return Err(StoreError::SequenceConflict {
                session_id: utterance.session_id,
                expected,
                actual: utterance.sequence,
            });
        }

        transcript.push(utterance.clone());
        Ok(())
    }

    async fn history(
        &self,
        session_id: Uuid,
        after_sequence: u64,
    ) -> Result<Vec<Utterance>, StoreError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions
            .get(&session_id)
            .map(|transcript| {
                transcript
                    .iter()
                    .filter(|u| u.sequence > after_sequence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn last_sequence(&self, session_id: Uuid) -> Result<u64, StoreError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sessions
            .get(&session_id)
            .and_then(|transcript| transcript.last())
            .map_or(0, |u| u.sequence))
    }

    fn forget(&self, session_id: Uuid) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
    }
}

#[async_trait]
impl TranscriptStore for UtteranceRepository {
    async fn append(&self, utterance: &Utterance) -> Result<(), StoreError> {
        UtteranceRepository::append(self, utterance).await?;
        Ok(())
    }

    async fn history(
        &self,
        session_id: Uuid,
        after_sequence: u64,
    ) -> Result<Vec<Utterance>, StoreError> {
        Ok(self.find_by_session_since(session_id, after_sequence).await?)
    }

    async fn last_sequence(&self, session_id: Uuid) -> Result<u64, StoreError> {
        Ok(UtteranceRepository::last_sequence(self, session_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debate_core::{DebatePhase, SpeakerRole, TurnKind};

    fn utterance(session_id: Uuid, sequence: u64) -> Utterance {
        Utterance::new(
            session_id,
            sequence,
            SpeakerRole::PRO,
            DebatePhase::Opening,
            TurnKind::Statement,
            "text",
        )
    }

    async fn exercise(store: &dyn TranscriptStore) {
        let session_id = Uuid::new_v4();
        assert_eq!(store.last_sequence(session_id).await.unwrap(), 0);

        for seq in 1..=4 {
            store.append(&utterance(session_id, seq)).await.unwrap();
        }

        let gap = store.append(&utterance(session_id, 6)).await;
        assert!(matches!(
            gap,
            Err(StoreError::SequenceConflict {
                expected: 5,
                actual: 6,
                ..
            })
        ));
        let duplicate = store.append(&utterance(session_id, 4)).await;
        assert!(matches!(duplicate, Err(StoreError::SequenceConflict { .. })));

        let tail: Vec<u64> = store
            .history(session_id, 2)
            .await
            .unwrap()
            .iter()
            .map(|u| u.sequence)
            .collect();
        assert_eq!(tail, vec![3, 4]);
        assert_eq!(store.last_sequence(session_id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        exercise(&InMemoryTranscriptStore::new()).await;
    }

    #[tokio::test]
    async fn test_repository_store() {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        exercise(&UtteranceRepository::new(pool)).await;
    }

    #[tokio::test]
    async fn test_forget_releases_only_that_session() {
        let store = InMemoryTranscriptStore::new();
        let gone = Uuid::new_v4();
        let kept = Uuid::new_v4();
        for seq in 1..=3 {
            store.append(&utterance(gone, seq)).await.unwrap();
            store.append(&utterance(kept, seq)).await.unwrap();
        }

        store.forget(gone);

        assert!(store.history(gone, 0).await.unwrap().is_empty());
        assert_eq!(store.last_sequence(gone).await.unwrap(), 0);
        assert_eq!(store.history(kept, 0).await.unwrap().len(), 3);
        assert_eq!(store.sessions.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_repository_keeps_forgotten_transcript() {
        let pool = db::create_memory_pool().await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let store = UtteranceRepository::new(pool);
        let session_id = Uuid::new_v4();
        store.append(&utterance(session_id, 1)).await.unwrap();

        TranscriptStore::forget(&store, session_id);

        assert_eq!(TranscriptStore::last_sequence(&store, session_id).await.unwrap(), 1);
    }
}
