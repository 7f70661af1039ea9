//! Turn-order authority: whose turn it is, in which phase, and which
//! lifecycle and phase transitions are legal.

use debate_core::{
    DebatePhase, EvidenceFocus, PhaseCursor, SessionConfig, SessionStatus, Side, SpeakerRole,
    StateError, TurnKind,
};
use serde::{Deserialize, Serialize};

/// One scheduled turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub phase: DebatePhase,
    pub speaker: SpeakerRole,
    pub kind: TurnKind,
    pub focus: Option<EvidenceFocus>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Normalizer,
    Moderator,
    Advocate(Side, TurnKind),
}

const OPENING: [Slot; 2] = [
    Slot::Advocate(Side::Pro, TurnKind::Statement),
    Slot::Advocate(Side::Con, TurnKind::Statement),
];

const CROSS_EXAM: [Slot; 4] = [
    Slot::Advocate(Side::Pro, TurnKind::Question),
    Slot::Advocate(Side::Con, TurnKind::Answer),
    Slot::Advocate(Side::Con, TurnKind::Question),
    Slot::Advocate(Side::Pro, TurnKind::Answer),
];

/// Pro then con for each constructive sub-round.
const CONSTRUCTIVE_TURNS: u32 = 2 * EvidenceFocus::ROUNDS.len() as u32;

pub struct PhaseStateMachine;

impl PhaseStateMachine {
    /// Number of turns played in `phase` for this configuration.
    pub fn turns_in_phase(phase: DebatePhase, config: &SessionConfig) -> u32 {
        match phase {
            DebatePhase::Initializing => u32::from(config.normalize),
            DebatePhase::Opening | DebatePhase::Rebuttal | DebatePhase::Closing => 2,
            DebatePhase::Constructive => CONSTRUCTIVE_TURNS,
            DebatePhase::CrossExam => CROSS_EXAM.len() as u32,
            DebatePhase::Synthesis => 1,
            DebatePhase::Completed => 0,
        }
    }

    /// Turns a full session produces, excluding ad-hoc answers.
    pub fn total_turns(config: &SessionConfig) -> u32 {
        DebatePhase::ORDER
            .iter()
            .map(|phase| Self::turns_in_phase(*phase, config))
            .sum()
    }

    /// Move past phases whose turns are exhausted (or which have none).
    pub fn settle(cursor: PhaseCursor, config: &SessionConfig) -> PhaseCursor {
        let mut cursor = cursor;
        while !cursor.phase.is_terminal()
            && cursor.turns_taken >= Self::turns_in_phase(cursor.phase, config)
        {
            match cursor.phase.successor() {
                Some(next) => cursor = PhaseCursor::at(next),
                None => break,
            }
        }
        cursor
    }

    /// The next actor, or `None` once the debate is complete.
    ///
    /// Depends only on the cursor and the seat configuration.
    pub fn next_speaker(cursor: PhaseCursor, config: &SessionConfig) -> Option<Turn> {
        let cursor = Self::settle(cursor, config);
        let index = cursor.turns_taken;

        let (slot, focus) = match cursor.phase {
            DebatePhase::Completed => return None,
            DebatePhase::Initializing => (Slot::Normalizer, None),
            DebatePhase::Synthesis => (Slot::Moderator, None),
            DebatePhase::Opening | DebatePhase::Rebuttal | DebatePhase::Closing => {
                (OPENING[index as usize % OPENING.len()], None)
            }
            DebatePhase::Constructive => {
                let side = if index % 2 == 0 { Side::Pro } else { Side::Con };
                let round = (index / 2) as usize % EvidenceFocus::ROUNDS.len();
                (
                    Slot::Advocate(side, TurnKind::Statement),
                    Some(EvidenceFocus::ROUNDS[round]),
                )
            }
            DebatePhase::CrossExam => (CROSS_EXAM[index as usize % CROSS_EXAM.len()], None),
        };

        let (speaker, kind) = match slot {
            Slot::Normalizer => (SpeakerRole::Normalizer, TurnKind::Statement),
            Slot::Moderator => (SpeakerRole::Moderator, TurnKind::Statement),
            Slot::Advocate(side, kind) => (Self::seat(side, config), kind),
        };

        Some(Turn {
            phase: cursor.phase,
            speaker,
            kind,
            focus,
        })
    }

    fn seat(side: Side, config: &SessionConfig) -> SpeakerRole {
        match config.human {
            Some(seat) if seat.side == side => SpeakerRole::HumanProxy(side),
            _ => SpeakerRole::Advocate(side),
        }
    }

    /// Cursor after one more turn of the current phase has been recorded.
    pub fn advance(cursor: PhaseCursor, config: &SessionConfig) -> Result<PhaseCursor, StateError> {
        let settled = Self::settle(cursor, config);
        if settled.phase.is_terminal() {
            return Err(StateError::IllegalPhaseTransition {
                from: DebatePhase::Completed,
                to: DebatePhase::Completed,
            });
        }

        let next = Self::settle(
            PhaseCursor {
                phase: settled.phase,
                turns_taken: settled.turns_taken + 1,
            },
            config,
        );
        if next.phase != settled.phase {
            Self::validate_phase_transition(settled.phase, next.phase)?;
        }
        Ok(next)
    }

    pub fn validate_phase_transition(
        from: DebatePhase,
        to: DebatePhase,
    ) -> Result<(), StateError> {
        let forward = DebatePhase::ORDER
            .iter()
            .position(|p| *p == from)
            .zip(DebatePhase::ORDER.iter().position(|p| *p == to))
            .is_some_and(|(f, t)| t > f);

        if forward {
            Ok(())
        } else {
            Err(StateError::IllegalPhaseTransition { from, to })
        }
    }

    pub fn validate_status_transition(
        from: SessionStatus,
        to: SessionStatus,
    ) -> Result<(), StateError> {
        if Self::allowed_status_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(StateError::IllegalStatusTransition { from, to })
        }
    }

    fn allowed_status_transitions(from: SessionStatus) -> &'static [SessionStatus] {
        match from {
            SessionStatus::Initializing => &[SessionStatus::Live, SessionStatus::Failed],
            SessionStatus::Live => &[
                SessionStatus::Paused,
                SessionStatus::Completed,
                SessionStatus::Failed,
            ],
            SessionStatus::Paused => &[SessionStatus::Live, SessionStatus::Failed],
            SessionStatus::Completed | SessionStatus::Failed => &[],
        }
    }
}
