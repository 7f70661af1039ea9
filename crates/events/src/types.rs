//! Event types for the debate session event system

use chrono::Utc;
use debate_core::{
    DebatePhase, HumanInputRequest, SessionConfig, SessionStatus, SpeakerRole, Utterance,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Session the event belongs to
    pub session_id: Uuid,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(session_id: Uuid, event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            timestamp: Utc::now().timestamp_millis(),
            event,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

/// All events a session emits to its subscribers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The orchestrator loop began running
    SessionStarted { config: SessionConfig },

    /// The phase cursor moved to a new phase
    PhaseTransition {
        from: DebatePhase,
        to: DebatePhase,
    },

    /// A streamed fragment of the turn being generated
    TurnToken {
        /// Sequence number the finished utterance will receive
        sequence: u64,
        #[schema(value_type = String)]
        #[cfg_attr(feature = "typescript", ts(type = "string"))]
        speaker: SpeakerRole,
        phase: DebatePhase,
        /// 0-based generation attempt; a higher value discards earlier tokens
        attempt: u32,
        token: String,
    },

    /// A turn was durably appended to the transcript
    TurnComplete { utterance: Utterance },

    /// The floor belongs to a human participant
    AwaitingHumanInput { request: HumanInputRequest },

    /// Step mode: one turn done, waiting for continue
    AwaitingContinue {
        #[schema(value_type = Option<String>)]
        #[cfg_attr(feature = "typescript", ts(type = "string | null"))]
        next_speaker: Option<SpeakerRole>,
        next_phase: DebatePhase,
    },

    SessionPaused { phase: DebatePhase },

    SessionResumed { phase: DebatePhase },

    SessionCompleted { utterance_count: u64 },

    /// Terminal failure; `reason` is always human-readable
    SessionFailed {
        reason: String,
        status: SessionStatus,
    },

    /// Replayed utterance for a (re)connecting subscriber
    CatchupUtterance { utterance: Utterance },

    /// Replay finished; live events follow
    CatchupComplete { last_sequence: u64 },

    /// Liveness pulse on an idle channel
    Heartbeat,
}

impl Event {
    /// Wire name of the event, as used for SSE event types
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session_started",
            Event::PhaseTransition { .. } => "phase_transition",
            Event::TurnToken { .. } => "turn_token",
            Event::TurnComplete { .. } => "turn_complete",
            Event::AwaitingHumanInput { .. } => "awaiting_human_input",
            Event::AwaitingContinue { .. } => "awaiting_continue",
            Event::SessionPaused { .. } => "session_paused",
            Event::SessionResumed { .. } => "session_resumed",
            Event::SessionCompleted { .. } => "session_completed",
            Event::SessionFailed { .. } => "session_failed",
            Event::CatchupUtterance { .. } => "catchup_utterance",
            Event::CatchupComplete { .. } => "catchup_complete",
            Event::Heartbeat => "heartbeat",
        }
    }

    /// Utterance sequence carried by this event, if it carries a full utterance
    pub fn utterance_sequence(&self) -> Option<u64> {
        match self {
            Event::TurnComplete { utterance } | Event::CatchupUtterance { utterance } => {
                Some(utterance.sequence)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::SessionCompleted { .. } | Event::SessionFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debate_core::TurnKind;

    fn utterance(sequence: u64) -> Utterance {
        Utterance::new(
            Uuid::new_v4(),
            sequence,
            SpeakerRole::PRO,
            DebatePhase::Opening,
            TurnKind::Statement,
            "Opening argument",
        )
    }

    #[test]
    fn test_event_envelope_creation() {
        let session_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(session_id, Event::Heartbeat);

        assert!(!envelope.id.is_nil());
        assert_eq!(envelope.session_id, session_id);
        assert!(envelope.timestamp <= Utc::now().timestamp_millis());
        assert_eq!(envelope.event_type(), "heartbeat");
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::PhaseTransition {
            from: DebatePhase::Opening,
            to: DebatePhase::Constructive,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"phase_transition\""));
        assert!(json.contains("\"from\":\"opening\""));
        assert!(json.contains("\"to\":\"constructive\""));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"session_failed","reason":"stopped: moderator unavailable","status":"failed"}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::SessionFailed { reason, status } => {
                assert_eq!(reason, "stopped: moderator unavailable");
                assert_eq!(status, SessionStatus::Failed);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_type_matches_serde_tag() {
        let events = vec![
            Event::TurnComplete {
                utterance: utterance(1),
            },
            Event::CatchupUtterance {
                utterance: utterance(2),
            },
            Event::CatchupComplete { last_sequence: 2 },
            Event::SessionCompleted { utterance_count: 2 },
            Event::Heartbeat,
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_type());
        }
    }

    #[test]
    fn test_turn_token_carries_attempt() {
        let event = Event::TurnToken {
            sequence: 4,
            speaker: SpeakerRole::CON,
            phase: DebatePhase::Rebuttal,
            attempt: 1,
            token: "second try".to_string(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "turn_token");
        assert_eq!(value["attempt"], 1);
        assert_eq!(event.utterance_sequence(), None);
    }

    #[test]
    fn test_utterance_sequence() {
        let event = Event::TurnComplete {
            utterance: utterance(7),
        };
        assert_eq!(event.utterance_sequence(), Some(7));
        assert_eq!(Event::Heartbeat.utterance_sequence(), None);
    }

    #[test]
    fn test_terminal_events() {
        assert!(Event::SessionCompleted { utterance_count: 3 }.is_terminal());
        assert!(Event::SessionFailed {
            reason: "x".to_string(),
            status: SessionStatus::Failed
        }
        .is_terminal());
        assert!(!Event::Heartbeat.is_terminal());
    }
}
