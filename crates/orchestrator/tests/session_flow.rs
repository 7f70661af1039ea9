use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use debate_core::{
    DebatePhase, HumanSeat, InterruptionPolicy, PhaseCursor, SessionConfig, SessionOption,
    SessionStatus, Severity, Side, SpeakerRole, TimeoutFallback, TurnKind,
};
use events::{Event, EventEnvelope};
use orchestrator::quality::{NO_REBUTTAL_IN_OPENING, WORD_COUNT};
use orchestrator::{
    Agent, AgentError, AgentReply, AgentRoster, InMemoryTranscriptStore, OrchestratorError,
    PhaseStateMachine, RetryPolicy, ScriptedAgent, SessionRegistry, SessionServices, Subscription,
    TranscriptStore, TurnContext,
};
use tokio_util::sync::CancellationToken;

const DEBATE_ORDER: [(DebatePhase, SpeakerRole); 17] = [
    (DebatePhase::Opening, SpeakerRole::PRO),
    (DebatePhase::Opening, SpeakerRole::CON),
    (DebatePhase::Constructive, SpeakerRole::PRO),
    (DebatePhase::Constructive, SpeakerRole::CON),
    (DebatePhase::Constructive, SpeakerRole::PRO),
    (DebatePhase::Constructive, SpeakerRole::CON),
    (DebatePhase::Constructive, SpeakerRole::PRO),
    (DebatePhase::Constructive, SpeakerRole::CON),
    (DebatePhase::CrossExam, SpeakerRole::PRO),
    (DebatePhase::CrossExam, SpeakerRole::CON),
    (DebatePhase::CrossExam, SpeakerRole::CON),
    (DebatePhase::CrossExam, SpeakerRole::PRO),
    (DebatePhase::Rebuttal, SpeakerRole::PRO),
    (DebatePhase::Rebuttal, SpeakerRole::CON),
    (DebatePhase::Closing, SpeakerRole::PRO),
    (DebatePhase::Closing, SpeakerRole::CON),
    (DebatePhase::Synthesis, SpeakerRole::Moderator),
];

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_backoff_ms: 1,
        ..RetryPolicy::default()
    }
}

fn registry_with(roster: AgentRoster) -> (SessionRegistry, Arc<InMemoryTranscriptStore>) {
    let store = Arc::new(InMemoryTranscriptStore::new());
    let registry = SessionRegistry::new(
        SessionServices::new(roster, store.clone()).with_retry(fast_retry()),
    );
    (registry, store)
}

/// Streaming agents that sleep between tokens, so the loop yields.
fn slow_roster() -> AgentRoster {
    AgentRoster::ROLES
        .into_iter()
        .fold(AgentRoster::new(), |roster, role| {
            roster.with(
                role,
                Arc::new(
                    ScriptedAgent::new(role.as_str())
                        .streaming(8)
                        .with_token_delay(Duration::from_millis(10)),
                ),
            )
        })
}

fn proposition() -> SessionConfig {
    SessionConfig::new("Cities should ban private cars from their centers.").with_normalize(false)
}

async fn collect_until_terminal(subscription: &mut Subscription) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    while let Some(envelope) = subscription.next().await {
        let terminal = envelope.event.is_terminal();
        if !matches!(envelope.event, Event::Heartbeat) {
            events.push(envelope);
        }
        if terminal {
            break;
        }
    }
    events
}

fn delivered_sequences(events: &[EventEnvelope]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| e.event.utterance_sequence())
        .collect()
}

/// Hangs on every call after the first `healthy_calls`.
struct HangAfter {
    inner: ScriptedAgent,
    healthy_calls: u32,
    calls: AtomicU32,
}

impl HangAfter {
    fn new(role: SpeakerRole, healthy_calls: u32) -> Self {
        Self {
            inner: ScriptedAgent::new(role.as_str()),
            healthy_calls,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Agent for HangAfter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(
        &self,
        ctx: &TurnContext,
        cancel: &CancellationToken,
    ) -> Result<AgentReply, AgentError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy_calls {
            cancel.cancelled().await;
            return Err(AgentError::Cancelled);
        }
        self.inner.generate(ctx, cancel).await
    }
}

#[tokio::test]
async fn test_full_debate_follows_rotation() {
    let (registry, store) = registry_with(AgentRoster::scripted());
    let handle = registry.start(proposition()).await.unwrap();
    let mut subscription = handle.subscribe(None).await.unwrap();

    let events = collect_until_terminal(&mut subscription).await;
    let session = handle.wait_terminal().await;

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.last_sequence, 17);
    assert!(session.completed_at.is_some());

    let transcript = store.history(session.id, 0).await.unwrap();
    let order: Vec<_> = transcript.iter().map(|u| (u.phase, u.speaker)).collect();
    assert_eq!(order, DEBATE_ORDER.to_vec());
    let sequences: Vec<u64> = transcript.iter().map(|u| u.sequence).collect();
    assert_eq!(sequences, (1..=17).collect::<Vec<_>>());

    assert_eq!(delivered_sequences(&events), (1..=17).collect::<Vec<_>>());
    assert!(matches!(
        events.last().map(|e| &e.event),
        Some(Event::SessionCompleted { utterance_count: 17 })
    ));

    let transitions: Vec<_> = events
        .iter()
        .filter_map(|e| match e.event {
            Event::PhaseTransition { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            DebatePhase::Opening,
            DebatePhase::Constructive,
            DebatePhase::CrossExam,
            DebatePhase::Rebuttal,
            DebatePhase::Closing,
            DebatePhase::Synthesis,
            DebatePhase::Completed,
        ]
    );
}

#[tokio::test]
async fn test_turn_metadata_recorded() {
    let (registry, store) = registry_with(AgentRoster::scripted());
    let handle = registry.start(proposition()).await.unwrap();
    let session = handle.wait_terminal().await;

    let transcript = store.history(session.id, 0).await.unwrap();
    let constructive: Vec<_> = transcript
        .iter()
        .filter(|u| u.phase == DebatePhase::Constructive)
        .collect();
    assert!(constructive.iter().all(|u| u.metadata.focus.is_some()));
    assert!(transcript.iter().all(|u| u.metadata.attempts == 1));

    let questions: Vec<_> = transcript
        .iter()
        .filter(|u| u.turn_kind == TurnKind::Question)
        .collect();
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|u| u.text.trim_end().ends_with('?')));
}

#[tokio::test]
async fn test_stop_mid_constructive_discards_in_flight_turn() {
    let roster =
        AgentRoster::scripted().with(SpeakerRole::CON, Arc::new(HangAfter::new(SpeakerRole::CON, 1)));
    let (registry, store) = registry_with(roster);
    let handle = registry.start(proposition()).await.unwrap();

    let waiting = handle.wait_until(|s| s.last_sequence == 3).await;
    assert_eq!(waiting.phase(), DebatePhase::Constructive);

    registry
        .interventions()
        .stop(handle.id(), Some("moderator called time".to_string()))
        .unwrap();
    let session = handle.wait_terminal().await;

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.as_deref(), Some("moderator called time"));
    assert_eq!(session.last_sequence, 3);
    assert_eq!(store.last_sequence(session.id).await.unwrap(), 3);

    // A stopped session accepts nothing further.
    let again = registry.interventions().pause(handle.id());
    assert!(matches!(again, Err(OrchestratorError::State(_))));
}

#[tokio::test(start_paused = true)]
async fn test_pause_and_resume_keep_the_cursor() {
    let (registry, store) = registry_with(slow_roster());
    let handle = registry.start(proposition()).await.unwrap();
    let interventions = registry.interventions();

    handle.wait_until(|s| s.status == SessionStatus::Live).await;
    interventions.pause(handle.id()).unwrap();

    let paused = handle.wait_until(|s| s.status == SessionStatus::Paused).await;
    let cursor = paused.cursor;
    let last_sequence = paused.last_sequence;
    assert!(last_sequence >= 1);

    tokio::time::sleep(Duration::from_secs(120)).await;
    let still = handle.snapshot();
    assert_eq!(still.status, SessionStatus::Paused);
    assert_eq!(still.cursor, cursor);
    assert_eq!(still.last_sequence, last_sequence);

    // Already paused.
    assert!(interventions.pause(handle.id()).is_err());

    interventions.resume(handle.id()).unwrap();
    let session = handle.wait_terminal().await;
    assert_eq!(session.status, SessionStatus::Completed);

    let sequences: Vec<u64> = store
        .history(session.id, 0)
        .await
        .unwrap()
        .iter()
        .map(|u| u.sequence)
        .collect();
    assert_eq!(sequences, (1..=17).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_paused_fails_without_new_turns() {
    let (registry, store) = registry_with(slow_roster());
    let handle = registry.start(proposition()).await.unwrap();
    let interventions = registry.interventions();

    handle.wait_until(|s| s.status == SessionStatus::Live).await;
    interventions.pause(handle.id()).unwrap();
    let paused = handle.wait_until(|s| s.status == SessionStatus::Paused).await;

    interventions
        .stop(handle.id(), Some("halt".to_string()))
        .unwrap();
    let session = handle.wait_terminal().await;

    assert_eq!(session.status, SessionStatus::Failed);
    assert_eq!(session.error.as_deref(), Some("halt"));
    assert_eq!(session.last_sequence, paused.last_sequence);
    assert_eq!(session.cursor, paused.cursor);
    assert_eq!(
        store.last_sequence(session.id).await.unwrap(),
        paused.last_sequence
    );
    assert!(interventions.resume(handle.id()).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_mid_session_receives_every_utterance_once() {
    let (registry, _store) = registry_with(slow_roster());
    let handle = registry.start(proposition()).await.unwrap();

    handle.wait_until(|s| s.last_sequence >= 3).await;
    let mut subscription = handle.subscribe(Some(3)).await.unwrap();
    let events = collect_until_terminal(&mut subscription).await;

    let sequences = delivered_sequences(&events);
    assert_eq!(sequences, (4..=17).collect::<Vec<_>>());
    let catchup_end = events
        .iter()
        .position(|e| matches!(e.event, Event::CatchupComplete { .. }))
        .unwrap();
    assert!(events[..catchup_end]
        .iter()
        .all(|e| matches!(e.event, Event::CatchupUtterance { .. })));
}

#[tokio::test]
async fn test_subscriber_after_completion_gets_replay_and_outcome() {
    let (registry, _store) = registry_with(AgentRoster::scripted());
    let handle = registry.start(proposition()).await.unwrap();
    handle.wait_terminal().await;

    let mut subscription = handle.subscribe(Some(5)).await.unwrap();
    let events = collect_until_terminal(&mut subscription).await;

    assert_eq!(delivered_sequences(&events), (6..=17).collect::<Vec<_>>());
    assert!(matches!(
        events[events.len() - 2].event,
        Event::CatchupComplete { last_sequence: 17 }
    ));
    assert!(matches!(
        events.last().map(|e| &e.event),
        Some(Event::SessionCompleted { .. })
    ));
    assert!(subscription.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_human_timeout_skips_turn() {
    let (registry, store) = registry_with(AgentRoster::scripted());
    let config = proposition().with_human(HumanSeat {
        side: Side::Pro,
        deadline_secs: Some(30),
        on_timeout: TimeoutFallback::SkipTurn,
    });
    let handle = registry.start(config).await.unwrap();
    let mut subscription = handle.subscribe(None).await.unwrap();

    let events = collect_until_terminal(&mut subscription).await;
    let session = handle.wait_terminal().await;

    assert_eq!(session.status, SessionStatus::Completed);
    let awaited = events
        .iter()
        .filter(|e| matches!(e.event, Event::AwaitingHumanInput { .. }))
        .count();
    assert_eq!(awaited, 8);

    let transcript = store.history(session.id, 0).await.unwrap();
    assert_eq!(transcript.len(), 9);
    assert!(transcript.iter().all(|u| !u.speaker.is_human()));
    let sequences: Vec<u64> = transcript.iter().map(|u| u.sequence).collect();
    assert_eq!(sequences, (1..=9).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_human_timeout_can_fail_session() {
    let (registry, store) = registry_with(AgentRoster::scripted());
    let config = proposition().with_human(HumanSeat {
        side: Side::Pro,
        deadline_secs: Some(30),
        on_timeout: TimeoutFallback::FailSession,
    });
    let handle = registry.start(config).await.unwrap();
    let session = handle.wait_terminal().await;

    assert_eq!(session.status, SessionStatus::Failed);
    let error = session.error.unwrap();
    assert!(error.contains("timed out after 30s"), "{error}");
    assert!(session.pending_human.is_none());
    assert_eq!(store.last_sequence(session.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_human_submissions_join_transcript() {
    let (registry, store) = registry_with(AgentRoster::scripted());
    let config = proposition().with_human(HumanSeat {
        side: Side::Con,
        deadline_secs: None,
        on_timeout: TimeoutFallback::SkipTurn,
    });
    let handle = registry.start(config).await.unwrap();
    let interventions = registry.interventions();

    let premature = interventions.submit_human_turn(handle.id(), None, "Too early.");
    assert!(matches!(premature, Err(OrchestratorError::State(_))));

    let mut subscription = handle.subscribe(None).await.unwrap();
    let mut submitted = 0;
    while let Some(envelope) = subscription.next().await {
        match envelope.event {
            Event::AwaitingHumanInput { request } => {
                assert_eq!(request.side, Side::Con);
                submitted += 1;
                interventions
                    .submit_human_turn(
                        handle.id(),
                        Some(request.id),
                        format!("Human point {submitted}."),
                    )
                    .unwrap();
            }
            event if event.is_terminal() => break,
            _ => {}
        }
    }

    let session = handle.wait_terminal().await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(submitted, 8);

    let transcript = store.history(session.id, 0).await.unwrap();
    assert_eq!(transcript.len(), 17);
    let human: Vec<_> = transcript
        .iter()
        .filter(|u| u.speaker == SpeakerRole::HumanProxy(Side::Con))
        .collect();
    assert_eq!(human.len(), 8);
    assert_eq!(human[0].text, "Human point 1.");
    assert_eq!(human[0].phase, DebatePhase::Opening);
}

#[tokio::test]
async fn test_step_mode_waits_for_continue() {
    let (registry, _store) = registry_with(AgentRoster::scripted());
    let handle = registry
        .start(proposition().with_step_mode(true))
        .await
        .unwrap();
    let interventions = registry.interventions();

    let early = interventions.continue_turn(handle.id());
    assert!(matches!(early, Err(OrchestratorError::State(_))));

    let mut subscription = handle.subscribe(None).await.unwrap();
    let mut completed_turns = 0;
    let mut continues = 0;
    while let Some(envelope) = subscription.next().await {
        match envelope.event {
            Event::TurnComplete { .. } => completed_turns += 1,
            Event::AwaitingContinue { .. } => {
                let snapshot = handle.snapshot();
                assert!(snapshot.awaiting_continue);
                assert_eq!(snapshot.last_sequence, completed_turns);
                continues += 1;
                interventions.continue_turn(handle.id()).unwrap();
            }
            event if event.is_terminal() => break,
            _ => {}
        }
    }

    assert_eq!(completed_turns, 17);
    assert_eq!(continues, 16);
    assert_eq!(handle.wait_terminal().await.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_ad_hoc_question_does_not_advance_cursor() {
    let (registry, store) = registry_with(AgentRoster::scripted());
    let handle = registry
        .start(proposition().with_step_mode(true))
        .await
        .unwrap();
    let interventions = registry.interventions();
    let mut subscription = handle.subscribe(None).await.unwrap();

    let mut asked = false;
    let mut cursor_before = PhaseCursor::default();
    while let Some(envelope) = subscription.next().await {
        match envelope.event {
            Event::AwaitingContinue { .. } if !asked => {
                asked = true;
                cursor_before = handle.snapshot().cursor;
                interventions
                    .ask(handle.id(), "What happens to delivery vans?", None)
                    .unwrap();
            }
            Event::TurnComplete { utterance } if utterance.metadata.ad_hoc => {
                assert_eq!(utterance.speaker, SpeakerRole::Moderator);
                assert_eq!(handle.snapshot().cursor, cursor_before);
                interventions.continue_turn(handle.id()).unwrap();
            }
            Event::AwaitingContinue { .. } => {
                interventions
                    .stop(handle.id(), Some("enough".to_string()))
                    .unwrap();
            }
            event if event.is_terminal() => break,
            _ => {}
        }
    }

    let session = handle.wait_terminal().await;
    assert_eq!(session.error.as_deref(), Some("enough"));

    let transcript = store.history(session.id, 0).await.unwrap();
    let speakers: Vec<_> = transcript.iter().map(|u| u.speaker).collect();
    assert_eq!(
        speakers,
        vec![SpeakerRole::PRO, SpeakerRole::Moderator, SpeakerRole::CON]
    );
    assert_eq!(transcript[1].phase, DebatePhase::Opening);
    assert!(transcript[1].text.contains("delivery vans"));
    assert!(!transcript[2].metadata.ad_hoc);
}

#[tokio::test]
async fn test_ad_hoc_rejected_when_interruptions_disabled() {
    let (registry, _store) = registry_with(AgentRoster::scripted());
    let config = proposition()
        .with_step_mode(true)
        .with_option(SessionOption::InterruptionPolicy(InterruptionPolicy::Disabled));
    let handle = registry.start(config).await.unwrap();

    handle.wait_until(|s| s.awaiting_continue).await;
    let result = registry.interventions().ask(handle.id(), "Why?", None);
    assert!(matches!(result, Err(OrchestratorError::State(_))));

    registry.interventions().stop(handle.id(), None).unwrap();
    let session = handle.wait_terminal().await;
    assert_eq!(session.error.as_deref(), Some("stopped"));
}

#[tokio::test]
async fn test_blocking_check_regenerates_turn() {
    let pro = Arc::new(ScriptedAgent::new("pro").with_reply("Far too short."));
    let roster = AgentRoster::scripted().with(SpeakerRole::PRO, pro.clone());
    let (registry, store) = registry_with(roster);
    let handle = registry
        .start(proposition().with_blocking_check(WORD_COUNT))
        .await
        .unwrap();

    let session = handle.wait_terminal().await;
    assert_eq!(session.status, SessionStatus::Completed);

    let opening = &store.history(session.id, 0).await.unwrap()[0];
    assert_eq!(opening.metadata.attempts, 2);
    assert_ne!(opening.text, "Far too short.");
    assert!(opening.metadata.quality.iter().all(|w| w.check != WORD_COUNT));
}

#[tokio::test(start_paused = true)]
async fn test_streamed_tokens_of_final_attempt_match_delivered_text() {
    let pro = ScriptedAgent::new("pro")
        .streaming(4)
        .with_token_delay(Duration::from_millis(10))
        .with_reply("Far too short.");
    let roster = AgentRoster::scripted().with(SpeakerRole::PRO, Arc::new(pro));
    let (registry, _store) = registry_with(roster);
    let handle = registry
        .start(proposition().with_blocking_check(WORD_COUNT))
        .await
        .unwrap();
    let mut subscription = handle.subscribe(None).await.unwrap();

    let events = collect_until_terminal(&mut subscription).await;

    let tokens: Vec<(u32, &str)> = events
        .iter()
        .filter_map(|e| match &e.event {
            Event::TurnToken {
                sequence: 1,
                attempt,
                token,
                ..
            } => Some((*attempt, token.as_str())),
            _ => None,
        })
        .collect();
    let joined = |wanted: u32| -> String {
        tokens
            .iter()
            .filter(|(attempt, _)| *attempt == wanted)
            .map(|(_, token)| *token)
            .collect()
    };
    let delivered = events
        .iter()
        .find_map(|e| match &e.event {
            Event::TurnComplete { utterance } if utterance.sequence == 1 => {
                Some(utterance.clone())
            }
            _ => None,
        })
        .unwrap();

    let last_attempt = tokens.iter().map(|(attempt, _)| *attempt).max().unwrap();
    assert_eq!(last_attempt, 1);
    assert_eq!(delivered.metadata.attempts, 2);
    assert_eq!(joined(0), "Far too short.");
    assert_eq!(joined(last_attempt), delivered.text);
}

#[tokio::test]
async fn test_blocking_check_exhausted_fails_session() {
    let pro = Arc::new(
        ScriptedAgent::new("pro")
            .with_reply("Far too short.")
            .with_reply("Still too short."),
    );
    let roster = AgentRoster::scripted().with(SpeakerRole::PRO, pro.clone());
    let (registry, store) = registry_with(roster);
    let handle = registry
        .start(proposition().with_blocking_check(WORD_COUNT))
        .await
        .unwrap();

    let session = handle.wait_terminal().await;
    assert_eq!(session.status, SessionStatus::Failed);
    assert!(session.error.unwrap().contains(WORD_COUNT));
    assert_eq!(pro.calls(), 2);
    assert_eq!(store.last_sequence(session.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_blocking_findings_attach_to_turn() {
    let pro = Arc::new(ScriptedAgent::new("pro").with_reply("Far too short."));
    let roster = AgentRoster::scripted().with(SpeakerRole::PRO, pro);
    let (registry, store) = registry_with(roster);
    let handle = registry.start(proposition()).await.unwrap();

    let session = handle.wait_terminal().await;
    assert_eq!(session.status, SessionStatus::Completed);

    let opening = &store.history(session.id, 0).await.unwrap()[0];
    assert_eq!(opening.text, "Far too short.");
    assert_eq!(opening.metadata.attempts, 1);
    assert!(opening.metadata.quality.iter().any(|w| w.check == WORD_COUNT));
}

#[tokio::test]
async fn test_error_finding_delivered_unless_policy_blocks() {
    let rebuttal = format!(
        "{} My opponent is simply wrong about congestion.",
        vec!["evidence"; 90].join(" ")
    );
    let pro = Arc::new(ScriptedAgent::new("pro").with_reply(rebuttal.clone()));
    let roster = AgentRoster::scripted().with(SpeakerRole::PRO, pro.clone());
    let (registry, store) = registry_with(roster);
    let handle = registry.start(proposition()).await.unwrap();

    let session = handle.wait_terminal().await;
    assert_eq!(session.status, SessionStatus::Completed);

    let opening = &store.history(session.id, 0).await.unwrap()[0];
    assert_eq!(opening.text, rebuttal);
    assert_eq!(opening.metadata.attempts, 1);
    let finding = opening
        .metadata
        .quality
        .iter()
        .find(|w| w.check == NO_REBUTTAL_IN_OPENING)
        .unwrap();
    assert_eq!(finding.severity, Severity::Error);
}

#[test]
fn test_rotation_total_for_every_seat_layout() {
    let seats = [
        None,
        Some(Side::Pro),
        Some(Side::Con),
    ];
    for normalize in [true, false] {
        for seat in seats {
            let mut config = SessionConfig::new("p").with_normalize(normalize);
            if let Some(side) = seat {
                config = config.with_human(HumanSeat {
                    side,
                    deadline_secs: None,
                    on_timeout: TimeoutFallback::SkipTurn,
                });
            }

            let mut cursor = PhaseCursor::default();
            let mut turns = 0;
            let mut last_phase = DebatePhase::Initializing;
            while let Some(turn) = PhaseStateMachine::next_speaker(cursor, &config) {
                assert!(turn.phase >= last_phase);
                if let SpeakerRole::HumanProxy(side) = turn.speaker {
                    assert_eq!(Some(side), seat);
                }
                last_phase = turn.phase;
                turns += 1;
                cursor = PhaseStateMachine::advance(cursor, &config).unwrap();
            }

            assert_eq!(turns, PhaseStateMachine::total_turns(&config));
            assert_eq!(turns, if normalize { 18 } else { 17 });
            assert!(PhaseStateMachine::advance(cursor, &config).is_err());
        }
    }
}
