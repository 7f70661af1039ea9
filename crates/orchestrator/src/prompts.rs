use debate_core::{Brevity, DebatePhase, SpeakerRole, TurnKind};

use crate::agent::TurnContext;

pub struct DebatePrompts;

impl DebatePrompts {
    /// Role instruction sent as the system message.
    pub fn system(ctx: &TurnContext) -> String {
        let role = match ctx.speaker {
            SpeakerRole::Normalizer => {
                return "Rewrite the proposition as one neutral, debatable yes/no question. \
                        Reply with the question only."
                    .to_string()
            }
            SpeakerRole::Moderator => "You are the neutral moderator of a structured debate.",
            SpeakerRole::Advocate(side) | SpeakerRole::HumanProxy(side) => match side {
                debate_core::Side::Pro => "You argue FOR the question in a structured debate.",
                debate_core::Side::Con => "You argue AGAINST the question in a structured debate.",
            },
        };

        let (min, max) = ctx.settings.brevity.word_bounds();
        let mut prompt = format!("{role}\nKeep your reply between {min} and {max} words.");
        if ctx.settings.require_citations {
            prompt.push_str("\nSupport factual claims with a cited source.");
        }
        prompt
    }

    /// Turn instruction plus the bounded transcript summary.
    pub fn user(ctx: &TurnContext) -> String {
        let mut prompt = format!("## Question\n{}\n\n", ctx.question());

        if !ctx.prior.is_empty() {
            prompt.push_str("## Recent turns\n");
            for prior in &ctx.prior {
                prompt.push_str(&format!(
                    "[{} / {}] {}\n",
                    prior.phase, prior.speaker, prior.text
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str("## Your task\n");
        prompt.push_str(&Self::task(ctx));
        prompt
    }

    fn task(ctx: &TurnContext) -> String {
        if let Some(question) = &ctx.ad_hoc_question {
            return format!("An observer asks: \"{question}\". Answer it directly.");
        }

        match (ctx.phase, ctx.kind) {
            (DebatePhase::Initializing, _) => {
                format!("Normalize this proposition: {}", ctx.proposition)
            }
            (DebatePhase::Opening, _) => {
                "Give your opening statement. Do not rebut the other side yet.".to_string()
            }
            (DebatePhase::Constructive, _) => format!(
                "Build your case with evidence focused on {}.",
                ctx.focus
                    .map(|f| f.as_str().replace('_', " / "))
                    .unwrap_or_else(|| "the strongest available evidence".to_string())
            ),
            (DebatePhase::CrossExam, TurnKind::Question) => {
                "Ask your opponent one pointed question.".to_string()
            }
            (DebatePhase::CrossExam, _) => "Answer the question you were just asked.".to_string(),
            (DebatePhase::Rebuttal, _) => "Rebut your opponent's strongest points.".to_string(),
            (DebatePhase::Closing, _) => "Give your closing statement.".to_string(),
            (DebatePhase::Synthesis, _) => {
                "Synthesize the debate: summarize the pro and con cases, where they agree, \
                 and what remains unresolved."
                    .to_string()
            }
            (DebatePhase::Completed, _) => String::new(),
        }
    }

    /// Rough token budget for a reply of the configured length.
    pub fn max_tokens(brevity: Brevity) -> u32 {
        let (_, max_words) = brevity.word_bounds();
        (max_words as u32) * 2
    }
}
