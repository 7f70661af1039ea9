use thiserror::Error;
use uuid::Uuid;

use crate::domain::{DebatePhase, SessionStatus};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    State(#[from] StateError),
}

/// An operation that is not legal for the session's current state.
///
/// Always surfaced to the caller and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Illegal status transition from {from} to {to}")]
    IllegalStatusTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Illegal phase transition from {from} to {to}")]
    IllegalPhaseTransition { from: DebatePhase, to: DebatePhase },

    #[error("Command '{command}' is not allowed while session is {status}")]
    CommandRejected {
        command: String,
        status: SessionStatus,
    },

    #[error("Session is not awaiting {0}")]
    NotAwaiting(String),
}

impl StateError {
    pub fn rejected(command: impl Into<String>, status: SessionStatus) -> Self {
        Self::CommandRejected {
            command: command.into(),
            status,
        }
    }
}
