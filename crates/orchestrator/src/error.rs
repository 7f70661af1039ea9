use debate_core::{CoreError, DebatePhase, SpeakerRole, StateError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Transcript store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Turn for {speaker} in {phase} failed after {attempts} attempt(s): {reason}")]
    TurnFailed {
        phase: DebatePhase,
        speaker: SpeakerRole,
        attempts: u32,
        reason: String,
    },

    /// The session's loop has exited and no longer accepts commands.
    #[error("Session {0} is no longer running")]
    SessionClosed(Uuid),
}

impl OrchestratorError {
    pub fn turn_failed(
        phase: DebatePhase,
        speaker: SpeakerRole,
        attempts: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::TurnFailed {
            phase,
            speaker,
            attempts,
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for OrchestratorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SessionNotFound(id) => Self::SessionNotFound(id),
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::State(e) => Self::State(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure of a single generation call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("generation cancelled")]
    Cancelled,

    #[error("empty response")]
    EmptyResponse,

    #[error("quality check '{check}' failed: {message}")]
    QualityRejected { check: String, message: String },

    #[error("request failed: {message}")]
    Request {
        message: String,
        status_code: Option<u16>,
    },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("no agent registered for {0}")]
    Unavailable(SpeakerRole),
}

impl AgentError {
    pub fn request(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Request {
            message: message.into(),
            status_code,
        }
    }

    /// Whether trying the same call again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cancelled | Self::Unavailable(_) => false,
            Self::Request {
                status_code: Some(code),
                ..
            } => *code == 429 || *code >= 500,
            _ => true,
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::request(err.to_string(), err.status().map(|s| s.as_u16()))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Sequence conflict for session {session_id}: expected {expected}, got {actual}")]
    SequenceConflict {
        session_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<db::DbError> for StoreError {
    fn from(err: db::DbError) -> Self {
        match err {
            db::DbError::SequenceConflict {
                session_id,
                expected,
                actual,
            } => Self::SequenceConflict {
                session_id,
                expected,
                actual,
            },
            other => Self::Backend(other.to_string()),
        }
    }
}

/// A subscriber's channel could not take an event. The subscriber is pruned.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber {0} disconnected")]
    Closed(Uuid),

    #[error("subscriber {0} is not keeping up")]
    Full(Uuid),
}

/// A human participant missed their deadline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("human input for {side} in {phase} timed out after {waited_secs}s")]
pub struct TimeoutError {
    pub side: debate_core::Side,
    pub phase: DebatePhase,
    pub waited_secs: u64,
}
