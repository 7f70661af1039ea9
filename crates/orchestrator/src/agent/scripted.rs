//! Deterministic agent for tests, demos and the `scripted` backend.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use debate_core::{DebatePhase, Side, SpeakerRole, TurnKind};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{Agent, AgentReply, TurnContext};
use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Whole,
    Stream { words_per_token: usize },
}

const ADVOCATE_LINES: [&str; 6] = [
    "Studies show that outcomes improve measurably when the policy is applied consistently and monitored in the open.",
    "Assuming that implementation costs stay moderate, the long-term benefits clearly outweigh the transition risks.",
    "Consider how this plays out for ordinary households and small businesses over the next decade.",
    "The practical details of enforcement matter as much as the principle itself.",
    "A careful reading of the available evidence points firmly in one direction.",
    "Communities that tried a similar approach report lasting and broadly shared gains.",
];

const MODERATOR_LINES: [&str; 4] = [
    "Both advocates engaged seriously with the economic, ethical and practical dimensions of the question.",
    "The areas of agreement are narrower than the rhetoric suggested, yet they are real.",
    "The central unresolved issue is how costs and benefits are distributed over time.",
    "Observers should weigh the quality of evidence offered rather than its volume.",
];

/// Agent that produces canned or generated text without any network calls.
pub struct ScriptedAgent {
    name: String,
    delivery: Delivery,
    token_delay: Duration,
    hang: bool,
    replies: Mutex<VecDeque<String>>,
    failures: Mutex<VecDeque<AgentError>>,
    calls: AtomicU32,
}

impl ScriptedAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            delivery: Delivery::Whole,
            token_delay: Duration::ZERO,
            hang: false,
            replies: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn streaming(mut self, words_per_token: usize) -> Self {
        self.delivery = Delivery::Stream {
            words_per_token: words_per_token.max(1),
        };
        self
    }

    pub fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    /// Never answer; wait until the call is cancelled.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Queue a fixed reply for the next call. Queued replies are used in
    /// order before falling back to generated text.
    pub fn with_reply(self, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(text.into());
        self
    }

    /// Fail the next calls with these errors, in order.
    pub fn with_failures(self, failures: impl IntoIterator<Item = AgentError>) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(failures);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_reply(&self, ctx: &TurnContext) -> String {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| generate_text(ctx))
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        ctx: &TurnContext,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.hang {
            cancel.cancelled().await;
            return Err(AgentError::Cancelled);
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let text = self.next_reply(ctx);
        match self.delivery {
            Delivery::Whole => Ok(AgentReply::Text(text)),
            Delivery::Stream { words_per_token } => {
                let delay = self.token_delay;
                let chunks = chunk_words(&text, words_per_token);
                let stream = futures::stream::iter(chunks).then(move |chunk| async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(chunk)
                });
                Ok(AgentReply::Stream(Box::pin(stream)))
            }
        }
    }
}

/// Split into chunks of `n` words, keeping the separating whitespace so
/// that concatenating the chunks restores the input.
fn chunk_words(text: &str, n: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut words = 0;

    for piece in text.split_inclusive(' ') {
        current.push_str(piece);
        words += 1;
        if words == n {
            chunks.push(std::mem::take(&mut current));
            words = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn fill(opening: String, lines: &[&str], target_words: usize, closing: Option<&str>) -> String {
    let mut text = opening;
    let mut i = 0;
    while text.split_whitespace().count() < target_words {
        text.push(' ');
        text.push_str(lines[i % lines.len()]);
        i += 1;
    }
    if let Some(closing) = closing {
        text.push(' ');
        text.push_str(closing);
    }
    text
}

fn generate_text(ctx: &TurnContext) -> String {
    let (min_words, _) = ctx.settings.brevity.word_bounds();
    let target = min_words + 20;
    let question = ctx.question().trim_end_matches(['.', '?', '!']).to_string();

    if let Some(asked) = &ctx.ad_hoc_question {
        return fill(
            format!("On the observer's question, \"{asked}\", the short answer is that it depends on execution."),
            &MODERATOR_LINES,
            target,
            None,
        );
    }

    match ctx.speaker {
        SpeakerRole::Normalizer => format!("Should we accept that {}?", lowercase_first(&question)),
        SpeakerRole::Moderator => fill(
            format!("In synthesis of the debate on whether {question}: the pro side argued for change while the con side urged caution."),
            &MODERATOR_LINES,
            target,
            None,
        ),
        SpeakerRole::Advocate(side) | SpeakerRole::HumanProxy(side) => {
            let stance = match side {
                Side::Pro => "in favour of",
                Side::Con => "against",
            };
            let opening = match (ctx.phase, ctx.kind) {
                (DebatePhase::CrossExam, TurnKind::Answer) => {
                    format!("To answer directly: my position {stance} the motion holds.")
                }
                (DebatePhase::Constructive, _) => format!(
                    "On the {} dimension, the case {stance} '{question}' is strong.",
                    ctx.focus.map(|f| f.as_str()).unwrap_or("general").replace('_', " and ")
                ),
                (DebatePhase::Rebuttal, _) => format!(
                    "My opponent's argument leaves key gaps, and the case {stance} '{question}' survives it."
                ),
                (DebatePhase::Closing, _) => {
                    format!("In closing, the case {stance} '{question}' remains the stronger one.")
                }
                _ => format!("I speak {stance} the question '{question}'."),
            };
            let closing = (ctx.kind == TurnKind::Question)
                .then_some("How does your position survive that evidence?");
            fill(opening, &ADVOCATE_LINES, target, closing)
        }
    }
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
