//! Named, independent checks over one generated text plus its turn
//! context, and the metadata extraction that accompanies them.
//!
//! The gate only grades a text as pass, warn or fail by finding severity.
//! Whether a finding stops a turn is the caller's decision: structural
//! checks (`non_empty`) always do, others only when listed in the
//! session's [`QualityPolicy`].

use std::sync::OnceLock;

use debate_core::{
    DebatePhase, DebateSettings, EvidenceClass, QualityPolicy, QualityWarning, Severity,
    SpeakerRole, TurnKind,
};
use regex::Regex;

pub const NON_EMPTY: &str = "non_empty";
pub const WORD_COUNT: &str = "word_count";
pub const NO_REBUTTAL_IN_OPENING: &str = "no_rebuttal_in_opening";
pub const CROSS_EXAM_QUESTION: &str = "cross_exam_question";
pub const CITATION_PRESENT: &str = "citation_present";
pub const SYNTHESIS_COVERS_BOTH_SIDES: &str = "synthesis_covers_both_sides";

const MAX_ASSUMPTIONS: usize = 5;

/// The parts of a turn the checks look at.
#[derive(Debug, Clone, Copy)]
pub struct QualityContext<'a> {
    pub phase: DebatePhase,
    pub speaker: SpeakerRole,
    pub kind: TurnKind,
    pub settings: &'a DebateSettings,
    pub ad_hoc: bool,
}

pub struct QualityCheck {
    pub name: &'static str,
    pub severity: Severity,
    applies: fn(&QualityContext) -> bool,
    run: fn(&str, &QualityContext) -> Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    /// Only warning-severity findings.
    Warn(Vec<QualityWarning>),
    /// At least one error-severity finding.
    Fail(Vec<QualityWarning>),
}

impl Verdict {
    fn from_findings(findings: Vec<QualityWarning>) -> Self {
        if findings.is_empty() {
            Verdict::Pass
        } else if findings.iter().any(|f| f.severity == Severity::Error) {
            Verdict::Fail(findings)
        } else {
            Verdict::Warn(findings)
        }
    }

    pub fn findings(&self) -> &[QualityWarning] {
        match self {
            Verdict::Pass => &[],
            Verdict::Warn(findings) | Verdict::Fail(findings) => findings,
        }
    }

    pub fn into_findings(self) -> Vec<QualityWarning> {
        match self {
            Verdict::Pass => Vec::new(),
            Verdict::Warn(findings) | Verdict::Fail(findings) => findings,
        }
    }

    /// First finding that must stop the turn under `policy`, whatever its
    /// severity.
    pub fn blocking(&self, policy: &QualityPolicy) -> Option<&QualityWarning> {
        self.findings()
            .iter()
            .find(|f| f.check == NON_EMPTY || policy.is_blocking(&f.check))
    }
}

pub struct QualityGate {
    checks: Vec<QualityCheck>,
}

impl Default for QualityGate {
    fn default() -> Self {
        Self::standard()
    }
}

impl QualityGate {
    pub fn standard() -> Self {
        Self {
            checks: vec![
                QualityCheck {
                    name: NON_EMPTY,
                    severity: Severity::Error,
                    applies: |_| true,
                    run: check_non_empty,
                },
                QualityCheck {
                    name: WORD_COUNT,
                    severity: Severity::Warning,
                    applies: |ctx| !ctx.ad_hoc && ctx.speaker != SpeakerRole::Normalizer,
                    run: check_word_count,
                },
                QualityCheck {
                    name: NO_REBUTTAL_IN_OPENING,
                    severity: Severity::Error,
                    applies: |ctx| !ctx.ad_hoc && ctx.phase == DebatePhase::Opening,
                    run: check_no_rebuttal,
                },
                QualityCheck {
                    name: CROSS_EXAM_QUESTION,
                    severity: Severity::Error,
                    applies: |ctx| {
                        !ctx.ad_hoc
                            && ctx.phase == DebatePhase::CrossExam
                            && ctx.kind == TurnKind::Question
                    },
                    run: check_contains_question,
                },
                QualityCheck {
                    name: CITATION_PRESENT,
                    severity: Severity::Warning,
                    applies: |ctx| {
                        ctx.settings.require_citations && ctx.speaker.side().is_some()
                    },
                    run: check_citation,
                },
                QualityCheck {
                    name: SYNTHESIS_COVERS_BOTH_SIDES,
                    severity: Severity::Warning,
                    applies: |ctx| {
                        !ctx.ad_hoc
                            && ctx.phase == DebatePhase::Synthesis
                            && ctx.speaker == SpeakerRole::Moderator
                    },
                    run: check_both_sides,
                },
            ],
        }
    }

    /// Run every applicable check; one finding per failed check.
    pub fn evaluate(&self, text: &str, ctx: &QualityContext) -> Vec<QualityWarning> {
        self.checks
            .iter()
            .filter(|check| (check.applies)(ctx))
            .filter_map(|check| {
                (check.run)(text, ctx).map(|message| QualityWarning {
                    check: check.name.to_string(),
                    severity: check.severity,
                    message,
                })
            })
            .collect()
    }

    pub fn verdict(&self, text: &str, ctx: &QualityContext) -> Verdict {
        Verdict::from_findings(self.evaluate(text, ctx))
    }
}

fn check_non_empty(text: &str, _: &QualityContext) -> Option<String> {
    text.trim()
        .is_empty()
        .then(|| "response is empty".to_string())
}

fn check_word_count(text: &str, ctx: &QualityContext) -> Option<String> {
    let (min, max) = ctx.settings.brevity.word_bounds();
    let words = text.split_whitespace().count();
    if words < min {
        Some(format!("{words} words, expected at least {min}"))
    } else if words > max {
        Some(format!("{words} words, expected at most {max}"))
    } else {
        None
    }
}

fn check_no_rebuttal(text: &str, _: &QualityContext) -> Option<String> {
    static REBUTTAL: OnceLock<Option<Regex>> = OnceLock::new();
    let re = REBUTTAL
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(rebut\w*|refut\w*|my opponent\w*|the opposing side|the other side (?:claims|argues|said))\b",
            )
            .ok()
        })
        .as_ref()?;

    re.find(text)
        .map(|m| format!("opening statement rebuts the other side (\"{}\")", m.as_str()))
}

fn check_contains_question(text: &str, _: &QualityContext) -> Option<String> {
    (!text.contains('?')).then(|| "cross-examination question contains no question".to_string())
}

fn check_citation(text: &str, _: &QualityContext) -> Option<String> {
    static CITATION: OnceLock<Option<Regex>> = OnceLock::new();
    let re = CITATION
        .get_or_init(|| {
            Regex::new(r"(?i)(\[\d+\]|https?://|\baccording to\b|\bsource:|\bet al\.|\(\w[^)]*\d{4}\))")
                .ok()
        })
        .as_ref()?;

    (!re.is_match(text)).then(|| "no citation found".to_string())
}

fn check_both_sides(text: &str, _: &QualityContext) -> Option<String> {
    static PRO: OnceLock<Option<Regex>> = OnceLock::new();
    static CON: OnceLock<Option<Regex>> = OnceLock::new();
    let pro = PRO
        .get_or_init(|| Regex::new(r"(?i)\b(pro|affirmative|proponents?|in favou?r)\b").ok())
        .as_ref()?;
    let con = CON
        .get_or_init(|| Regex::new(r"(?i)\b(con|negative|opponents?|against)\b").ok())
        .as_ref()?;

    match (pro.is_match(text), con.is_match(text)) {
        (true, true) => None,
        (false, true) => Some("synthesis does not address the pro side".to_string()),
        (true, false) => Some("synthesis does not address the con side".to_string()),
        (false, false) => Some("synthesis addresses neither side".to_string()),
    }
}

/// Coarse classification of the strongest kind of evidence a text relies on.
pub fn classify_evidence(text: &str) -> EvidenceClass {
    static PATTERNS: OnceLock<Vec<(EvidenceClass, Regex)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            (
                EvidenceClass::Empirical,
                r"(?i)\b(stud(?:y|ies)|data|survey\w*|statistic\w*|percent|research|measur\w*|trial\w*)\b|\d+(?:\.\d+)?%",
            ),
            (
                EvidenceClass::Anecdotal,
                r"(?i)\b(for example|for instance|anecdot\w*|a friend|my experience|i once|story)\b",
            ),
            (
                EvidenceClass::Theoretical,
                r"(?i)\b(in principle|theor\w*|logically|it follows|by definition|in theory)\b",
            ),
        ]
        .into_iter()
        .filter_map(|(class, pattern)| Regex::new(pattern).ok().map(|re| (class, re)))
        .collect()
    });

    patterns
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(class, _)| *class)
        .unwrap_or_default()
}

/// Stated assumptions ("assuming that ...", "given that ...").
pub fn extract_assumptions(text: &str) -> Vec<String> {
    static ASSUMPTION: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = ASSUMPTION
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(?:assuming(?: that)?|we assume(?: that)?|provided that|given that|presumably)\s+([^,.;:!?]+)",
            )
            .ok()
        })
        .as_ref()
    else {
        return Vec::new();
    };

    let mut assumptions: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        let clause = caps[1].trim().to_string();
        if !clause.is_empty() && !assumptions.contains(&clause) {
            assumptions.push(clause);
        }
        if assumptions.len() == MAX_ASSUMPTIONS {
            break;
        }
    }
    assumptions
}
