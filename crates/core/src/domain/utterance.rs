use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::phase::{DebatePhase, EvidenceFocus, SpeakerRole, TurnKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A quality-check finding attached to an utterance. Never fatal by itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct QualityWarning {
    pub check: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EvidenceClass {
    Empirical,
    Anecdotal,
    Theoretical,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct UtteranceMetadata {
    #[serde(default)]
    pub evidence: EvidenceClass,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assumptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality: Vec<QualityWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<EvidenceFocus>,
    /// Answer to an observer question; does not count toward the phase.
    #[serde(default)]
    pub ad_hoc: bool,
    /// Generation attempts it took to produce this text.
    #[serde(default)]
    pub attempts: u32,
}

/// One agent's (or the human's) contribution. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Utterance {
    pub session_id: Uuid,
    /// 1-based, gap-free within a session.
    pub sequence: u64,
    #[schema(value_type = String)]
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub speaker: SpeakerRole,
    pub phase: DebatePhase,
    pub turn_kind: TurnKind,
    pub text: String,
    pub metadata: UtteranceMetadata,
    pub created_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(
        session_id: Uuid,
        sequence: u64,
        speaker: SpeakerRole,
        phase: DebatePhase,
        turn_kind: TurnKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            sequence,
            speaker,
            phase,
            turn_kind,
            text: text.into(),
            metadata: UtteranceMetadata::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: UtteranceMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}
