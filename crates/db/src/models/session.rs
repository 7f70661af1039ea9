use debate_core::{DebatePhase, PhaseCursor, Session, SessionConfig, SessionStatus};
use uuid::Uuid;

use super::{datetime_to_millis, millis_to_datetime};
use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DebateSessionRow {
    pub id: String,
    pub config: String,
    pub normalized_question: Option<String>,
    pub phase: String,
    pub turns_taken: i64,
    pub status: String,
    pub last_sequence: i64,
    pub error: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

impl DebateSessionRow {
    pub fn into_domain(self) -> Result<Session, DbError> {
        let config: SessionConfig = serde_json::from_str(&self.config)
            .map_err(|e| DbError::CorruptRow(format!("session {} config: {}", self.id, e)))?;

        Ok(Session {
            id: Uuid::parse_str(&self.id).unwrap_or_default(),
            config,
            normalized_question: self.normalized_question,
            cursor: PhaseCursor {
                phase: DebatePhase::parse(&self.phase).unwrap_or_default(),
                turns_taken: self.turns_taken.max(0) as u32,
            },
            status: SessionStatus::parse(&self.status).unwrap_or_default(),
            last_sequence: self.last_sequence.max(0) as u64,
            // Pending waits are runtime-only; a reloaded session is never mid-wait.
            pending_human: None,
            awaiting_continue: false,
            error: self.error,
            created_at: millis_to_datetime(self.created_at),
            started_at: self.started_at.map(millis_to_datetime),
            completed_at: self.completed_at.map(millis_to_datetime),
        })
    }
}

impl TryFrom<&Session> for DebateSessionRow {
    type Error = DbError;

    fn try_from(session: &Session) -> Result<Self, Self::Error> {
        let config = serde_json::to_string(&session.config)
            .map_err(|e| DbError::CorruptRow(format!("session {} config: {}", session.id, e)))?;

        Ok(Self {
            id: session.id.to_string(),
            config,
            normalized_question: session.normalized_question.clone(),
            phase: session.cursor.phase.as_str().to_string(),
            turns_taken: i64::from(session.cursor.turns_taken),
            status: session.status.as_str().to_string(),
            last_sequence: session.last_sequence as i64,
            error: session.error.clone(),
            created_at: datetime_to_millis(session.created_at),
            started_at: session.started_at.map(datetime_to_millis),
            completed_at: session.completed_at.map(datetime_to_millis),
        })
    }
}
