use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::intervention::HumanInputRequest;
use super::options::{DebateSettings, SessionConfig};
use super::phase::{DebatePhase, PhaseCursor};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Initializing,
    Live,
    Paused,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Live => "live",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initializing" => Some(Self::Initializing),
            "live" => Some(Self::Live),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured debate instance.
///
/// Mutated only by the session's orchestrator loop; everyone else sees
/// snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Session {
    pub id: Uuid,
    pub config: SessionConfig,
    pub normalized_question: Option<String>,
    pub cursor: PhaseCursor,
    pub status: SessionStatus,
    /// Highest appended utterance sequence, 0 before the first turn.
    pub last_sequence: u64,
    pub pending_human: Option<HumanInputRequest>,
    pub awaiting_continue: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            normalized_question: None,
            cursor: PhaseCursor::default(),
            status: SessionStatus::default(),
            last_sequence: 0,
            pending_human: None,
            awaiting_continue: false,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn phase(&self) -> DebatePhase {
        self.cursor.phase
    }

    pub fn settings(&self) -> DebateSettings {
        self.config.settings()
    }

    pub fn proposition(&self) -> &str {
        &self.config.proposition
    }

    /// The question the advocates actually argue: normalized if available.
    pub fn question(&self) -> &str {
        self.normalized_question
            .as_deref()
            .unwrap_or(&self.config.proposition)
    }

    pub fn start(&mut self) {
        self.status = SessionStatus::Live;
        self.started_at = Some(Utc::now());
    }

    pub fn pause(&mut self) {
        self.status = SessionStatus::Paused;
    }

    pub fn resume(&mut self) {
        self.status = SessionStatus::Live;
    }

    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.cursor = PhaseCursor::at(DebatePhase::Completed);
        self.pending_human = None;
        self.awaiting_continue = false;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.error = Some(reason.into());
        self.pending_human = None;
        self.awaiting_continue = false;
        self.completed_at = Some(Utc::now());
    }

    pub fn next_sequence(&self) -> u64 {
        self.last_sequence + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = Session::new(SessionConfig::new("Remote work beats office work"));

        assert_eq!(session.status, SessionStatus::Initializing);
        assert_eq!(session.phase(), DebatePhase::Initializing);
        assert_eq!(session.last_sequence, 0);
        assert_eq!(session.next_sequence(), 1);
        assert_eq!(session.question(), "Remote work beats office work");
    }

    #[test]
    fn test_session_lifecycle() {
        let mut session = Session::new(SessionConfig::new("p"));

        session.start();
        assert_eq!(session.status, SessionStatus::Live);
        assert!(session.started_at.is_some());

        session.pause();
        assert_eq!(session.status, SessionStatus::Paused);
        session.resume();
        assert_eq!(session.status, SessionStatus::Live);

        session.complete();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.phase(), DebatePhase::Completed);
        assert!(session.completed_at.is_some());
    }

    #[test]
    fn test_session_failure_records_reason() {
        let mut session = Session::new(SessionConfig::new("p"));
        session.start();
        session.fail("stopped by operator");

        assert!(session.status.is_terminal());
        assert_eq!(session.error.as_deref(), Some("stopped by operator"));
    }

    #[test]
    fn test_normalized_question_preferred() {
        let mut session = Session::new(SessionConfig::new("ban cars??"));
        session.normalized_question = Some("Should cities ban private cars?".to_string());
        assert_eq!(session.question(), "Should cities ban private cars?");
        assert_eq!(session.proposition(), "ban cars??");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(SessionStatus::parse("paused"), Some(SessionStatus::Paused));
        assert_eq!(SessionStatus::parse("stopped"), None);
        assert_eq!(SessionStatus::Live.as_str(), "live");
    }
}
