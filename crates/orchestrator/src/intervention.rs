//! Typed operator commands, validated against the session's current state
//! before they reach the loop.

use debate_core::{
    InterruptionPolicy, InterventionKind, PendingIntervention, Session, SessionStatus,
    SpeakerRole, StateError,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::registry::SessionRegistry;
use crate::session_orchestrator::SessionHandle;

/// A command from an operator or participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Intervention {
    Pause,
    Resume,
    /// Step mode: release the next turn.
    Continue,
    Stop {
        #[serde(default)]
        reason: Option<String>,
    },
    HumanTurn {
        text: String,
        /// The request being answered; defaults to the one open when the
        /// command is accepted.
        #[serde(default)]
        request_id: Option<Uuid>,
    },
    AdHocQuestion {
        question: String,
        /// Defaults to the moderator.
        #[serde(default)]
        #[schema(value_type = Option<String>)]
        #[cfg_attr(feature = "typescript", ts(type = "string | null"))]
        target: Option<SpeakerRole>,
    },
}

impl Intervention {
    pub fn kind(&self) -> InterventionKind {
        match self {
            Self::Pause => InterventionKind::Pause,
            Self::Resume => InterventionKind::Resume,
            Self::Continue => InterventionKind::Step,
            Self::Stop { .. } => InterventionKind::Stop,
            Self::HumanTurn { .. } => InterventionKind::HumanTurn,
            Self::AdHocQuestion { .. } => InterventionKind::AdHocQuestion,
        }
    }

    /// Check the command against a snapshot of the session.
    pub fn validate(&self, session: &Session) -> Result<()> {
        let status = session.status;
        let kind = self.kind();

        if status.is_terminal() {
            return Err(StateError::rejected(kind.as_str(), status).into());
        }

        match self {
            Self::Pause if status != SessionStatus::Live => {
                Err(StateError::rejected(kind.as_str(), status).into())
            }
            Self::Resume if status != SessionStatus::Paused => {
                Err(StateError::rejected(kind.as_str(), status).into())
            }
            Self::Continue if !session.awaiting_continue => {
                Err(StateError::NotAwaiting("continue".to_string()).into())
            }
            Self::HumanTurn { text, request_id } => match &session.pending_human {
                None => Err(StateError::NotAwaiting("human input".to_string()).into()),
                Some(open) if request_id.is_some_and(|id| id != open.id) => {
                    Err(StateError::NotAwaiting(format!("a reply to request {}", open.id)).into())
                }
                Some(_) if text.trim().is_empty() => Err(OrchestratorError::Validation(
                    "human turn text must not be empty".to_string(),
                )),
                Some(_) => Ok(()),
            },
            Self::AdHocQuestion { question, target } => {
                if session.settings().interruption_policy == InterruptionPolicy::Disabled {
                    return Err(StateError::rejected(kind.as_str(), status).into());
                }
                if question.trim().is_empty() {
                    return Err(OrchestratorError::Validation(
                        "question must not be empty".to_string(),
                    ));
                }
                match target {
                    Some(SpeakerRole::Advocate(_) | SpeakerRole::Moderator) | None => Ok(()),
                    Some(role) => Err(OrchestratorError::Validation(format!(
                        "{role} cannot answer ad-hoc questions"
                    ))),
                }
            }
            _ => Ok(()),
        }
    }

    /// Build the queued command. A human turn is bound to the request open
    /// in `session`, so the loop can drop it if that request has moved on.
    fn into_pending(self, session: &Session) -> PendingIntervention {
        let pending = PendingIntervention::new(self.kind());
        match self {
            Self::Stop {
                reason: Some(reason),
            } => pending.with_payload(reason),
            Self::HumanTurn { text, request_id } => {
                let pending = pending.with_payload(text);
                match request_id.or(session.pending_human.as_ref().map(|r| r.id)) {
                    Some(id) => pending.with_reply_to(id),
                    None => pending,
                }
            }
            Self::AdHocQuestion { question, target } => {
                let pending = pending.with_payload(question);
                match target {
                    Some(target) => pending.with_target(target),
                    None => pending,
                }
            }
            _ => pending,
        }
    }
}

/// Routes validated commands to the owning session loop.
#[derive(Clone)]
pub struct InterventionHandler {
    registry: SessionRegistry,
}

impl InterventionHandler {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    pub fn handle(&self, session_id: Uuid, intervention: Intervention) -> Result<PendingIntervention> {
        let handle = self.registry.get(session_id)?;
        Self::dispatch(&handle, intervention)
    }

    /// Validate and enqueue. Stop additionally cancels in-flight generation.
    pub fn dispatch(handle: &SessionHandle, intervention: Intervention) -> Result<PendingIntervention> {
        let session = handle.snapshot();
        intervention.validate(&session)?;

        let pending = intervention.into_pending(&session);
        info!(
            session_id = %handle.id(),
            intervention_id = %pending.id,
            kind = %pending.kind,
            "Intervention accepted"
        );

        let is_stop = pending.kind == InterventionKind::Stop;
        handle.enqueue(pending.clone())?;
        if is_stop {
            handle.cancel();
        }
        Ok(pending)
    }

    pub fn pause(&self, session_id: Uuid) -> Result<PendingIntervention> {
        self.handle(session_id, Intervention::Pause)
    }

    pub fn resume(&self, session_id: Uuid) -> Result<PendingIntervention> {
        self.handle(session_id, Intervention::Resume)
    }

    pub fn continue_turn(&self, session_id: Uuid) -> Result<PendingIntervention> {
        self.handle(session_id, Intervention::Continue)
    }

    pub fn stop(&self, session_id: Uuid, reason: Option<String>) -> Result<PendingIntervention> {
        self.handle(session_id, Intervention::Stop { reason })
    }

    /// Answer the open human input request. With `request_id` set, the
    /// submission is refused unless that request is still the open one.
    pub fn submit_human_turn(
        &self,
        session_id: Uuid,
        request_id: Option<Uuid>,
        text: impl Into<String>,
    ) -> Result<PendingIntervention> {
        self.handle(
            session_id,
            Intervention::HumanTurn {
                text: text.into(),
                request_id,
            },
        )
    }

    pub fn ask(
        &self,
        session_id: Uuid,
        question: impl Into<String>,
        target: Option<SpeakerRole>,
    ) -> Result<PendingIntervention> {
        self.handle(
            session_id,
            Intervention::AdHocQuestion {
                question: question.into(),
                target,
            },
        )
    }
}
