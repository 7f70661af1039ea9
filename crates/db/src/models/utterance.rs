use debate_core::{DebatePhase, SpeakerRole, TurnKind, Utterance, UtteranceMetadata};
use uuid::Uuid;

use super::{datetime_to_millis, millis_to_datetime};
use crate::error::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UtteranceRow {
    pub session_id: String,
    pub sequence: i64,
    pub speaker: String,
    pub phase: String,
    pub turn_kind: String,
    pub text: String,
    pub metadata: String,
    pub created_at: i64,
}

fn turn_kind_str(kind: TurnKind) -> &'static str {
    match kind {
        TurnKind::Statement => "statement",
        TurnKind::Question => "question",
        TurnKind::Answer => "answer",
    }
}

fn parse_turn_kind(s: &str) -> TurnKind {
    match s {
        "question" => TurnKind::Question,
        "answer" => TurnKind::Answer,
        _ => TurnKind::Statement,
    }
}

impl UtteranceRow {
    pub fn into_domain(self) -> Result<Utterance, DbError> {
        let speaker = SpeakerRole::parse(&self.speaker).ok_or_else(|| {
            DbError::CorruptRow(format!(
                "utterance {}#{} speaker '{}'",
                self.session_id, self.sequence, self.speaker
            ))
        })?;
        let metadata: UtteranceMetadata =
            serde_json::from_str(&self.metadata).unwrap_or_default();

        Ok(Utterance {
            session_id: Uuid::parse_str(&self.session_id).unwrap_or_default(),
            sequence: self.sequence.max(0) as u64,
            speaker,
            phase: DebatePhase::parse(&self.phase).unwrap_or_default(),
            turn_kind: parse_turn_kind(&self.turn_kind),
            text: self.text,
            metadata,
            created_at: millis_to_datetime(self.created_at),
        })
    }
}

impl From<&Utterance> for UtteranceRow {
    fn from(utterance: &Utterance) -> Self {
        Self {
            session_id: utterance.session_id.to_string(),
            sequence: utterance.sequence as i64,
            speaker: utterance.speaker.as_str().to_string(),
            phase: utterance.phase.as_str().to_string(),
            turn_kind: turn_kind_str(utterance.turn_kind).to_string(),
            text: utterance.text.clone(),
            metadata: serde_json::to_string(&utterance.metadata)
                .unwrap_or_else(|_| "{}".to_string()),
            created_at: datetime_to_millis(utterance.created_at),
        }
    }
}
