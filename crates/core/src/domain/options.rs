use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::phase::Side;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Brevity {
    Short,
    #[default]
    Standard,
    Extended,
}

impl Brevity {
    /// Acceptable word count range for a single turn.
    pub fn word_bounds(&self) -> (usize, usize) {
        match self {
            Self::Short => (40, 200),
            Self::Standard => (80, 450),
            Self::Extended => (150, 900),
        }
    }
}

/// Whether observers may inject questions between turns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum InterruptionPolicy {
    #[default]
    BetweenTurns,
    Disabled,
}

/// One entry of a session's ordered option list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "option", content = "value", rename_all = "snake_case")]
pub enum SessionOption {
    Brevity(Brevity),
    Temperature(f32),
    RequireCitations(bool),
    InterruptionPolicy(InterruptionPolicy),
}

/// Options folded into effective values. Later entries win.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DebateSettings {
    pub brevity: Brevity,
    pub temperature: f32,
    pub require_citations: bool,
    pub interruption_policy: InterruptionPolicy,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            brevity: Brevity::default(),
            temperature: 0.7,
            require_citations: false,
            interruption_policy: InterruptionPolicy::default(),
        }
    }
}

impl DebateSettings {
    pub fn resolve(options: &[SessionOption]) -> Self {
        options
            .iter()
            .fold(Self::default(), |mut settings, option| {
                match *option {
                    SessionOption::Brevity(b) => settings.brevity = b,
                    SessionOption::Temperature(t) => settings.temperature = t,
                    SessionOption::RequireCitations(c) => settings.require_citations = c,
                    SessionOption::InterruptionPolicy(p) => settings.interruption_policy = p,
                }
                settings
            })
    }
}

/// What happens when a human misses their deadline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum TimeoutFallback {
    #[default]
    SkipTurn,
    FailSession,
}

/// A human participant taking over one advocate seat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct HumanSeat {
    pub side: Side,
    /// Seconds the human has to answer; `None` waits indefinitely.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    #[serde(default)]
    pub on_timeout: TimeoutFallback,
}

/// Quality checks that must pass for a turn to be recorded.
///
/// Empty by default: quality findings are attached as metadata and the turn
/// is delivered anyway.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct QualityPolicy {
    #[serde(default)]
    pub blocking: Vec<String>,
}

impl QualityPolicy {
    pub fn is_blocking(&self, check: &str) -> bool {
        self.blocking.iter().any(|name| name == check)
    }
}

fn default_true() -> bool {
    true
}

/// Everything needed to start a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct SessionConfig {
    pub proposition: String,
    #[serde(default)]
    pub options: Vec<SessionOption>,
    /// Pause after every turn until an explicit continue.
    #[serde(default)]
    pub step_mode: bool,
    /// Run the normalizer before the opening statements.
    #[serde(default = "default_true")]
    pub normalize: bool,
    #[serde(default)]
    pub human: Option<HumanSeat>,
    #[serde(default)]
    pub quality_policy: QualityPolicy,
}

impl SessionConfig {
    pub fn new(proposition: impl Into<String>) -> Self {
        Self {
            proposition: proposition.into(),
            options: Vec::new(),
            step_mode: false,
            normalize: true,
            human: None,
            quality_policy: QualityPolicy::default(),
        }
    }

    pub fn with_option(mut self, option: SessionOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_step_mode(mut self, step_mode: bool) -> Self {
        self.step_mode = step_mode;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_human(mut self, seat: HumanSeat) -> Self {
        self.human = Some(seat);
        self
    }

    pub fn with_blocking_check(mut self, check: impl Into<String>) -> Self {
        self.quality_policy.blocking.push(check.into());
        self
    }

    pub fn settings(&self) -> DebateSettings {
        DebateSettings::resolve(&self.options)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.proposition.trim().is_empty() {
            return Err(CoreError::Validation(
                "proposition must not be empty".to_string(),
            ));
        }

        for option in &self.options {
            if let SessionOption::Temperature(t) = option {
                if !(0.0..=2.0).contains(t) {
                    return Err(CoreError::Validation(format!(
                        "temperature {t} is outside 0.0..=2.0"
                    )));
                }
            }
        }

        if let Some(seat) = &self.human {
            if seat.deadline_secs == Some(0) {
                return Err(CoreError::Validation(
                    "human deadline must be at least one second".to_string(),
                ));
            }
        }

        Ok(())
    }
}
