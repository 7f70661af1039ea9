use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::phase::{DebatePhase, Side, SpeakerRole, TurnKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    Pause,
    Resume,
    Step,
    Stop,
    HumanTurn,
    AdHocQuestion,
}

impl InterventionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Step => "step",
            Self::Stop => "stop",
            Self::HumanTurn => "human_turn",
            Self::AdHocQuestion => "ad_hoc_question",
        }
    }
}

impl fmt::Display for InterventionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command waiting for the orchestrator's next safe point.
///
/// Consumed at most once; never retried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PendingIntervention {
    pub id: Uuid,
    pub kind: InterventionKind,
    #[schema(value_type = Option<String>)]
    #[cfg_attr(feature = "typescript", ts(type = "string | null"))]
    pub target: Option<SpeakerRole>,
    pub payload: Option<String>,
    /// The [`HumanInputRequest`] a human turn answers.
    #[serde(default)]
    pub reply_to: Option<Uuid>,
    pub received_at: DateTime<Utc>,
}

impl PendingIntervention {
    pub fn new(kind: InterventionKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target: None,
            payload: None,
            reply_to: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_target(mut self, target: SpeakerRole) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_reply_to(mut self, request_id: Uuid) -> Self {
        self.reply_to = Some(request_id);
        self
    }

    /// Whether this is a human turn answering exactly `request`.
    pub fn answers(&self, request: &HumanInputRequest) -> bool {
        self.kind == InterventionKind::HumanTurn && self.reply_to == Some(request.id)
    }
}

/// Issued while the floor belongs to a human participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct HumanInputRequest {
    pub id: Uuid,
    pub side: Side,
    pub phase: DebatePhase,
    pub prompt_type: TurnKind,
    pub deadline: Option<DateTime<Utc>>,
    pub issued_at: DateTime<Utc>,
}

impl HumanInputRequest {
    pub fn new(side: Side, phase: DebatePhase, prompt_type: TurnKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            side,
            phase,
            prompt_type,
            deadline: None,
            issued_at: Utc::now(),
        }
    }

    pub fn with_deadline_secs(mut self, secs: Option<u64>) -> Self {
        self.deadline = secs.map(|s| self.issued_at + chrono::Duration::seconds(s as i64));
        self
    }
}
