//! Uniform interface over every reasoning participant.
//!
//! An agent turns a [`TurnContext`] into text, either whole or as a lazy,
//! finite token stream. Generation must stop promptly once the supplied
//! [`CancellationToken`] fires.

mod chat_completion;
mod roster;
mod scripted;

pub use chat_completion::{ChatCompletionAgent, ChatCompletionConfig};
pub use roster::AgentRoster;
pub use scripted::{Delivery, ScriptedAgent};

use std::pin::Pin;

use async_trait::async_trait;
use debate_core::{
    DebatePhase, DebateSettings, EvidenceFocus, Session, SpeakerRole, TurnKind, Utterance,
};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AgentError;
use crate::state_machine::Turn;

/// How many prior utterances an agent sees.
pub const PRIOR_UTTERANCE_LIMIT: usize = 6;
/// Per-utterance character cap inside the prior summary.
pub const PRIOR_UTTERANCE_CHARS: usize = 600;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

pub enum AgentReply {
    Text(String),
    Stream(TokenStream),
}

impl AgentReply {
    /// Drain the reply into one string, forwarding each fragment to `on_token`.
    ///
    /// Returns `AgentError::Cancelled` as soon as `cancel` fires.
    pub async fn collect(
        self,
        cancel: &CancellationToken,
        mut on_token: impl FnMut(&str),
    ) -> Result<String, AgentError> {
        match self {
            AgentReply::Text(text) => {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                on_token(&text);
                Ok(text)
            }
            AgentReply::Stream(mut stream) => {
                let mut text = String::new();
                loop {
                    let next = tokio::select! {
                        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(token)) => {
                            on_token(&token);
                            text.push_str(&token);
                        }
                        Some(Err(e)) => return Err(e),
                        None => break,
                    }
                }
                Ok(text)
            }
        }
    }
}

impl std::fmt::Debug for AgentReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentReply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            AgentReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        context: &TurnContext,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, AgentError>;
}

/// Bounded view of an earlier utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorUtterance {
    pub sequence: u64,
    pub speaker: SpeakerRole,
    pub phase: DebatePhase,
    pub text: String,
}

/// Everything an agent is told about the turn it has to produce.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: Uuid,
    pub proposition: String,
    pub normalized_question: Option<String>,
    pub phase: DebatePhase,
    pub speaker: SpeakerRole,
    pub kind: TurnKind,
    pub focus: Option<EvidenceFocus>,
    pub settings: DebateSettings,
    /// Set when answering an observer question instead of a scheduled turn.
    pub ad_hoc_question: Option<String>,
    pub prior: Vec<PriorUtterance>,
}

impl TurnContext {
    pub fn build(session: &Session, turn: &Turn, history: &[Utterance]) -> Self {
        let start = history.len().saturating_sub(PRIOR_UTTERANCE_LIMIT);
        let prior = history[start..]
            .iter()
            .map(|u| PriorUtterance {
                sequence: u.sequence,
                speaker: u.speaker,
                phase: u.phase,
                text: truncate_chars(&u.text, PRIOR_UTTERANCE_CHARS),
            })
            .collect();

        Self {
            session_id: session.id,
            proposition: session.proposition().to_string(),
            normalized_question: session.normalized_question.clone(),
            phase: turn.phase,
            speaker: turn.speaker,
            kind: turn.kind,
            focus: turn.focus,
            settings: session.settings(),
            ad_hoc_question: None,
            prior,
        }
    }

    pub fn with_ad_hoc_question(mut self, question: impl Into<String>) -> Self {
        self.ad_hoc_question = Some(question.into());
        self
    }

    /// The question under debate, normalized when available.
    pub fn question(&self) -> &str {
        self.normalized_question
            .as_deref()
            .unwrap_or(&self.proposition)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debate_core::SessionConfig;
    use futures::stream;

    fn history(session_id: Uuid, count: u64) -> Vec<Utterance> {
        (1..=count)
            .map(|seq| {
                Utterance::new(
                    session_id,
                    seq,
                    SpeakerRole::PRO,
                    DebatePhase::Opening,
                    TurnKind::Statement,
                    "x".repeat(700 + seq as usize),
                )
            })
            .collect()
    }

    #[test]
    fn test_context_keeps_bounded_history() {
        let session = Session::new(SessionConfig::new("Nuclear power is green"));
        let turn = Turn {
            phase: DebatePhase::Rebuttal,
            speaker: SpeakerRole::CON,
            kind: TurnKind::Statement,
            focus: None,
        };
        let ctx = TurnContext::build(&session, &turn, &history(session.id, 10));

        assert_eq!(ctx.prior.len(), PRIOR_UTTERANCE_LIMIT);
        assert_eq!(ctx.prior[0].sequence, 5);
        assert_eq!(ctx.prior[5].sequence, 10);
        assert!(ctx
            .prior
            .iter()
            .all(|p| p.text.chars().count() == PRIOR_UTTERANCE_CHARS + 3));
        assert_eq!(ctx.question(), "Nuclear power is green");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[tokio::test]
    async fn test_collect_stream_forwards_tokens() {
        let reply = AgentReply::Stream(Box::pin(stream::iter(vec![
            Ok("Hello ".to_string()),
            Ok("world".to_string()),
        ])));

        let mut seen = Vec::new();
        let text = reply
            .collect(&CancellationToken::new(), |t| seen.push(t.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "Hello world");
        assert_eq!(seen, vec!["Hello ", "world"]);
    }

    #[tokio::test]
    async fn test_collect_stops_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reply = AgentReply::Stream(Box::pin(stream::pending()));

        let result = reply.collect(&cancel, |_| {}).await;
        assert_eq!(result, Err(AgentError::Cancelled));
    }
}
