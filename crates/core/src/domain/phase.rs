use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The debate's turn-order phases, in the order they are played.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    ToSchema,
)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    #[default]
    Initializing,
    Opening,
    Constructive,
    CrossExam,
    Rebuttal,
    Closing,
    Synthesis,
    Completed,
}

impl DebatePhase {
    pub const ORDER: [DebatePhase; 8] = [
        Self::Initializing,
        Self::Opening,
        Self::Constructive,
        Self::CrossExam,
        Self::Rebuttal,
        Self::Closing,
        Self::Synthesis,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Opening => "opening",
            Self::Constructive => "constructive",
            Self::CrossExam => "cross_exam",
            Self::Rebuttal => "rebuttal",
            Self::Closing => "closing",
            Self::Synthesis => "synthesis",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|p| p.as_str() == s)
    }

    /// The phase that follows this one, `None` once completed.
    pub fn successor(&self) -> Option<Self> {
        let idx = Self::ORDER.iter().position(|p| p == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Pro,
    Con,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Pro => Self::Con,
            Self::Con => Self::Pro,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pro => "pro",
            Self::Con => "con",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who holds the floor for a turn.
///
/// Serialized as a flat string (`"pro"`, `"human_con"`, ...) so transcripts
/// stay readable on the wire and in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SpeakerRole {
    Normalizer,
    Advocate(Side),
    Moderator,
    /// A human occupying one of the advocate seats.
    HumanProxy(Side),
}

impl SpeakerRole {
    pub const PRO: SpeakerRole = SpeakerRole::Advocate(Side::Pro);
    pub const CON: SpeakerRole = SpeakerRole::Advocate(Side::Con);

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalizer => "normalizer",
            Self::Advocate(Side::Pro) => "pro",
            Self::Advocate(Side::Con) => "con",
            Self::Moderator => "moderator",
            Self::HumanProxy(Side::Pro) => "human_pro",
            Self::HumanProxy(Side::Con) => "human_con",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normalizer" => Some(Self::Normalizer),
            "pro" => Some(Self::PRO),
            "con" => Some(Self::CON),
            "moderator" => Some(Self::Moderator),
            "human_pro" => Some(Self::HumanProxy(Side::Pro)),
            "human_con" => Some(Self::HumanProxy(Side::Con)),
            _ => None,
        }
    }

    /// The debate side this speaker argues for, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Advocate(side) | Self::HumanProxy(side) => Some(*side),
            Self::Normalizer | Self::Moderator => None,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::HumanProxy(_))
    }
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown speaker role: {s}"))
    }
}

impl From<SpeakerRole> for String {
    fn from(role: SpeakerRole) -> Self {
        role.as_str().to_string()
    }
}

impl TryFrom<String> for SpeakerRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    #[default]
    Statement,
    Question,
    Answer,
}

/// Evidentiary focus of the three constructive sub-rounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum EvidenceFocus {
    EconomicTechnical,
    EthicalSocial,
    Practical,
}

impl EvidenceFocus {
    pub const ROUNDS: [EvidenceFocus; 3] = [
        Self::EconomicTechnical,
        Self::EthicalSocial,
        Self::Practical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EconomicTechnical => "economic_technical",
            Self::EthicalSocial => "ethical_social",
            Self::Practical => "practical",
        }
    }
}

/// Position within the turn rotation: the phase plus how many turns of it
/// have already been recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseCursor {
    pub phase: DebatePhase,
    pub turns_taken: u32,
}

impl PhaseCursor {
    pub fn at(phase: DebatePhase) -> Self {
        Self {
            phase,
            turns_taken: 0,
        }
    }
}
