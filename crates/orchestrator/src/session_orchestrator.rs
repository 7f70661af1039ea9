//! The single writer for one session: drives the phase state machine,
//! calls agents, gates their output, appends to the transcript and
//! publishes to the session hub.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use db::DebateSessionRepository;
use debate_core::{
    DebatePhase, HumanInputRequest, InterventionKind, PendingIntervention, QualityWarning,
    Session, SessionStatus, Side, SpeakerRole, StateError, TimeoutFallback, TurnKind, Utterance,
    UtteranceMetadata,
};
use events::{Event, EventBus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, AgentRoster, TurnContext, PRIOR_UTTERANCE_LIMIT};
use crate::error::{AgentError, OrchestratorError, StoreError, TimeoutError};
use crate::hub::{HubConfig, SessionHub, Subscription};
use crate::quality::{self, classify_evidence, extract_assumptions, QualityContext, QualityGate};
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::state_machine::{PhaseStateMachine, Turn};
use crate::transcript::TranscriptStore;

const DEFAULT_STOP_REASON: &str = "stopped";

/// Shared collaborators every session loop needs.
#[derive(Clone)]
pub struct SessionServices {
    pub roster: AgentRoster,
    pub store: Arc<dyn TranscriptStore>,
    pub bus: Option<EventBus>,
    pub retry: RetryPolicy,
    pub hub: HubConfig,
    pub repository: Option<DebateSessionRepository>,
}

impl SessionServices {
    pub fn new(roster: AgentRoster, store: Arc<dyn TranscriptStore>) -> Self {
        Self {
            roster,
            store,
            bus: None,
            retry: RetryPolicy::default(),
            hub: HubConfig::default(),
            repository: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_hub_config(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    pub fn with_repository(mut self, repository: DebateSessionRepository) -> Self {
        self.repository = Some(repository);
        self
    }
}

/// Control and observation handle for a running session loop.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    commands: mpsc::UnboundedSender<PendingIntervention>,
    cancel: CancellationToken,
    snapshot: watch::Receiver<Session>,
    hub: SessionHub,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.session_id
    }

    /// Latest state published by the loop.
    pub fn snapshot(&self) -> Session {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.snapshot.clone()
    }

    pub fn hub(&self) -> &SessionHub {
        &self.hub
    }

    pub async fn subscribe(&self, last_seen: Option<u64>) -> Result<Subscription, StoreError> {
        self.hub.subscribe(last_seen).await
    }

    /// Whether the loop is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub(crate) fn enqueue(&self, command: PendingIntervention) -> Result<(), OrchestratorError> {
        self.commands
            .send(command)
            .map_err(|_| OrchestratorError::SessionClosed(self.session_id))
    }

    /// Abort any in-flight generation. The loop picks the stop reason up
    /// from the queued command.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolve once a published snapshot satisfies `predicate`, or with the
    /// last snapshot if the loop has gone away.
    pub async fn wait_until(&self, mut predicate: impl FnMut(&Session) -> bool) -> Session {
        let mut rx = self.snapshot.clone();
        if let Ok(session) = rx.wait_for(|s| predicate(s)).await {
            return session.clone();
        }
        let last = rx.borrow().clone();
        last
    }

    pub async fn wait_terminal(&self) -> Session {
        self.wait_until(|s| s.status.is_terminal()).await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Why the loop stopped producing turns early.
#[derive(Debug)]
enum Halt {
    Stopped(String),
    Failed(OrchestratorError),
}

impl From<OrchestratorError> for Halt {
    fn from(err: OrchestratorError) -> Self {
        Halt::Failed(err)
    }
}

impl From<StateError> for Halt {
    fn from(err: StateError) -> Self {
        Halt::Failed(err.into())
    }
}

enum Wait {
    Cancelled,
    Timeout,
    Command(Option<PendingIntervention>),
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub struct SessionOrchestrator {
    session: Session,
    roster: AgentRoster,
    store: Arc<dyn TranscriptStore>,
    hub: SessionHub,
    gate: QualityGate,
    retry: RetryPolicy,
    repository: Option<DebateSessionRepository>,
    commands: mpsc::UnboundedReceiver<PendingIntervention>,
    deferred: VecDeque<PendingIntervention>,
    cancel: CancellationToken,
    snapshot: watch::Sender<Session>,
    /// Tail of the transcript used to build agent context.
    history: Vec<Utterance>,
}

impl SessionOrchestrator {
    /// Start the loop for `session` on the current runtime.
    pub fn spawn(session: Session, services: &SessionServices) -> (SessionHandle, JoinHandle<Session>) {
        let mut hub = SessionHub::new(session.id, Arc::clone(&services.store), services.hub);
        if let Some(bus) = &services.bus {
            hub = hub.with_event_bus(bus.clone());
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.clone());
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            session_id: session.id,
            commands: command_tx,
            cancel: cancel.clone(),
            snapshot: snapshot_rx,
            hub: hub.clone(),
        };

        let orchestrator = Self {
            session,
            roster: services.roster.clone(),
            store: Arc::clone(&services.store),
            hub,
            gate: QualityGate::standard(),
            retry: services.retry,
            repository: services.repository.clone(),
            commands: command_rx,
            deferred: VecDeque::new(),
            cancel,
            snapshot: snapshot_tx,
            history: Vec::new(),
        };

        let task = tokio::spawn(orchestrator.run());
        (handle, task)
    }

    pub async fn run(mut self) -> Session {
        let session_id = self.session.id;
        info!(
            session_id = %session_id,
            proposition = %self.session.proposition(),
            step_mode = self.session.config.step_mode,
            "Session loop started"
        );

        let outcome = match self.begin().await {
            Ok(()) => self.drive().await,
            Err(e) => Err(Halt::Failed(e)),
        };

        match outcome {
            Ok(()) => self.complete().await,
            Err(Halt::Stopped(reason)) => {
                info!(session_id = %session_id, reason = %reason, "Session stopped");
                self.fail(reason).await;
            }
            Err(Halt::Failed(e)) => {
                error!(session_id = %session_id, error = %e, "Session failed");
                self.fail(e.to_string()).await;
            }
        }

        self.session
    }

    async fn begin(&mut self) -> Result<(), OrchestratorError> {
        let existing = self.store.history(self.session.id, 0).await?;
        if let Some(last) = existing.last() {
            self.session.last_sequence = self.session.last_sequence.max(last.sequence);
        }
        self.history = existing;
        self.trim_history();

        PhaseStateMachine::validate_status_transition(self.session.status, SessionStatus::Live)?;
        self.session.start();
        self.sync().await;
        self.hub.publish(Event::SessionStarted {
            config: self.session.config.clone(),
        });
        Ok(())
    }

    async fn drive(&mut self) -> Result<(), Halt> {
        loop {
            self.safe_point().await?;
            self.settle_cursor()?;

            let Some(turn) =
                PhaseStateMachine::next_speaker(self.session.cursor, &self.session.config)
            else {
                return Ok(());
            };

            debug!(
                session_id = %self.session.id,
                phase = %turn.phase,
                speaker = %turn.speaker,
                sequence = self.session.next_sequence(),
                "Starting turn"
            );

            match turn.speaker {
                SpeakerRole::HumanProxy(side) => self.human_turn(turn, side).await?,
                _ => self.agent_turn(turn).await?,
            }

            self.advance()?;
            self.sync().await;

            if self.session.config.step_mode && !self.session.cursor.phase.is_terminal() {
                self.await_continue().await?;
            }
        }
    }

    /// Apply queued commands. Only called between turns.
    async fn safe_point(&mut self) -> Result<(), Halt> {
        loop {
            let next = match self.deferred.pop_front() {
                Some(command) => Some(command),
                None => self.commands.try_recv().ok(),
            };
            let Some(command) = next else { break };

            match command.kind {
                InterventionKind::Pause => self.pause().await?,
                InterventionKind::Stop => return Err(Halt::Stopped(stop_reason_of(&command))),
                InterventionKind::AdHocQuestion => self.answer_ad_hoc(command).await?,
                InterventionKind::HumanTurn => {
                    warn!(
                        session_id = %self.session.id,
                        intervention_id = %command.id,
                        "Human turn submitted while none was pending; dropped"
                    );
                }
                InterventionKind::Resume | InterventionKind::Step => {
                    debug!(
                        session_id = %self.session.id,
                        kind = %command.kind,
                        "Command not applicable at this point; dropped"
                    );
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(Halt::Stopped(self.stop_reason()));
        }
        Ok(())
    }

    /// Reason carried by a queued stop command, if any.
    fn stop_reason(&mut self) -> String {
        while let Ok(command) = self.commands.try_recv() {
            self.deferred.push_back(command);
        }
        self.deferred
            .iter()
            .find(|c| c.kind == InterventionKind::Stop)
            .map(stop_reason_of)
            .unwrap_or_else(|| DEFAULT_STOP_REASON.to_string())
    }

    async fn next_command(&mut self, deadline: Option<Instant>) -> Wait {
        tokio::select! {
            _ = self.cancel.cancelled() => Wait::Cancelled,
            _ = deadline_elapsed(deadline) => Wait::Timeout,
            command = self.commands.recv() => Wait::Command(command),
        }
    }

    async fn pause(&mut self) -> Result<(), Halt> {
        PhaseStateMachine::validate_status_transition(self.session.status, SessionStatus::Paused)?;
        self.session.pause();
        self.sync().await;
        self.hub.publish(Event::SessionPaused {
            phase: self.session.phase(),
        });
        info!(session_id = %self.session.id, phase = %self.session.phase(), "Session paused");

        loop {
            let command = match self.next_command(None).await {
                Wait::Cancelled => return Err(Halt::Stopped(self.stop_reason())),
                Wait::Timeout | Wait::Command(None) => {
                    return Err(Halt::Stopped(DEFAULT_STOP_REASON.to_string()))
                }
                Wait::Command(Some(command)) => command,
            };

            match command.kind {
                InterventionKind::Resume => break,
                InterventionKind::Stop => return Err(Halt::Stopped(stop_reason_of(&command))),
                InterventionKind::AdHocQuestion => self.deferred.push_back(command),
                _ => debug!(
                    session_id = %self.session.id,
                    kind = %command.kind,
                    "Ignored while paused"
                ),
            }
        }

        PhaseStateMachine::validate_status_transition(self.session.status, SessionStatus::Live)?;
        self.session.resume();
        self.sync().await;
        self.hub.publish(Event::SessionResumed {
            phase: self.session.phase(),
        });
        info!(session_id = %self.session.id, phase = %self.session.phase(), "Session resumed");
        Ok(())
    }

    async fn await_continue(&mut self) -> Result<(), Halt> {
        let next = PhaseStateMachine::next_speaker(self.session.cursor, &self.session.config);
        self.session.awaiting_continue = true;
        self.sync().await;
        self.hub.publish(Event::AwaitingContinue {
            next_speaker: next.map(|t| t.speaker),
            next_phase: next.map_or(DebatePhase::Completed, |t| t.phase),
        });

        loop {
            let command = match self.next_command(None).await {
                Wait::Cancelled => return Err(Halt::Stopped(self.stop_reason())),
                Wait::Timeout | Wait::Command(None) => {
                    return Err(Halt::Stopped(DEFAULT_STOP_REASON.to_string()))
                }
                Wait::Command(Some(command)) => command,
            };

            match command.kind {
                InterventionKind::Step => break,
                InterventionKind::Stop => return Err(Halt::Stopped(stop_reason_of(&command))),
                InterventionKind::AdHocQuestion => self.answer_ad_hoc(command).await?,
                InterventionKind::Pause => self.deferred.push_back(command),
                _ => debug!(
                    session_id = %self.session.id,
                    kind = %command.kind,
                    "Ignored while awaiting continue"
                ),
            }
        }

        self.session.awaiting_continue = false;
        self.sync().await;
        Ok(())
    }

    fn settle_cursor(&mut self) -> Result<(), StateError> {
        let settled = PhaseStateMachine::settle(self.session.cursor, &self.session.config);
        if settled.phase != self.session.cursor.phase {
            self.transition_phase(self.session.cursor.phase, settled.phase)?;
        }
        self.session.cursor = settled;
        Ok(())
    }

    fn advance(&mut self) -> Result<(), StateError> {
        let from = self.session.cursor.phase;
        let next = PhaseStateMachine::advance(self.session.cursor, &self.session.config)?;
        if next.phase != from {
            self.transition_phase(from, next.phase)?;
        }
        self.session.cursor = next;
        Ok(())
    }

    fn transition_phase(&self, from: DebatePhase, to: DebatePhase) -> Result<(), StateError> {
        PhaseStateMachine::validate_phase_transition(from, to)?;
        info!(session_id = %self.session.id, from = %from, to = %to, "Phase transition");
        self.hub.publish(Event::PhaseTransition { from, to });
        Ok(())
    }

    async fn agent_turn(&mut self, turn: Turn) -> Result<(), Halt> {
        let agent = self.roster.get(turn.speaker).map_err(|e| {
            OrchestratorError::turn_failed(turn.phase, turn.speaker, 0, e.to_string())
        })?;
        let context = TurnContext::build(&self.session, &turn, &self.history);

        match self.generate(agent.as_ref(), &context, false).await {
            RetryOutcome::Success {
                value: (text, findings),
                attempts,
            } => {
                if turn.speaker == SpeakerRole::Normalizer {
                    self.session.normalized_question = normalize_question(&text);
                }
                let utterance = self.record(&turn, text, findings, attempts, false);
                self.append(utterance).await?;
                Ok(())
            }
            RetryOutcome::Failed {
                error: AgentError::Cancelled,
                ..
            } => Err(Halt::Stopped(self.stop_reason())),
            RetryOutcome::Failed { error, attempts } => Err(Halt::Failed(
                OrchestratorError::turn_failed(turn.phase, turn.speaker, attempts, error.to_string()),
            )),
        }
    }

    /// One generation with retries; blocking quality failures count as
    /// failed attempts.
    async fn generate(
        &self,
        agent: &dyn Agent,
        context: &TurnContext,
        ad_hoc: bool,
    ) -> RetryOutcome<(String, Vec<QualityWarning>)> {
        let sequence = self.session.next_sequence();
        let policy = &self.session.config.quality_policy;

        self.retry
            .run(&self.cancel, "generate_turn", |attempt| async move {
                if attempt > 0 {
                    debug!(
                        session_id = %self.session.id,
                        agent = agent.name(),
                        attempt,
                        "Regenerating turn"
                    );
                }

                let reply = agent.generate(context, &self.cancel).await?;
                let text = reply
                    .collect(&self.cancel, |token| {
                        self.hub.publish(Event::TurnToken {
                            sequence,
                            speaker: context.speaker,
                            phase: context.phase,
                            attempt,
                            token: token.to_string(),
                        });
                    })
                    .await?;

                let quality_context = QualityContext {
                    phase: context.phase,
                    speaker: context.speaker,
                    kind: context.kind,
                    settings: &context.settings,
                    ad_hoc,
                };
                let verdict = self.gate.verdict(&text, &quality_context);
                if let Some(blocking) = verdict.blocking(policy) {
                    warn!(
                        session_id = %self.session.id,
                        speaker = %context.speaker,
                        check = %blocking.check,
                        message = %blocking.message,
                        "Blocking quality check failed"
                    );
                    return if blocking.check == quality::NON_EMPTY {
                        Err(AgentError::EmptyResponse)
                    } else {
                        Err(AgentError::QualityRejected {
                            check: blocking.check.clone(),
                            message: blocking.message.clone(),
                        })
                    };
                }
                Ok((text, verdict.into_findings()))
            })
            .await
    }

    async fn human_turn(&mut self, turn: Turn, side: Side) -> Result<(), Halt> {
        let seat = self.session.config.human.unwrap_or(debate_core::HumanSeat {
            side,
            deadline_secs: None,
            on_timeout: TimeoutFallback::default(),
        });

        let request = HumanInputRequest::new(side, turn.phase, turn.kind)
            .with_deadline_secs(seat.deadline_secs);
        self.session.pending_human = Some(request.clone());
        self.sync().await;
        self.hub.publish(Event::AwaitingHumanInput {
            request: request.clone(),
        });
        info!(
            session_id = %self.session.id,
            side = %side,
            phase = %turn.phase,
            deadline_secs = ?seat.deadline_secs,
            "Awaiting human input"
        );

        let deadline = seat
            .deadline_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        let submission = loop {
            let command = match self.next_command(deadline).await {
                Wait::Cancelled => {
                    self.session.pending_human = None;
                    return Err(Halt::Stopped(self.stop_reason()));
                }
                Wait::Timeout => break None,
                Wait::Command(None) => {
                    return Err(Halt::Stopped(DEFAULT_STOP_REASON.to_string()))
                }
                Wait::Command(Some(command)) => command,
            };

            match command.kind {
                InterventionKind::HumanTurn if command.answers(&request) => {
                    break Some(command.payload.unwrap_or_default())
                }
                InterventionKind::HumanTurn => warn!(
                    session_id = %self.session.id,
                    intervention_id = %command.id,
                    reply_to = ?command.reply_to,
                    request_id = %request.id,
                    "Dropped human turn for a superseded request"
                ),
                InterventionKind::Stop => {
                    self.session.pending_human = None;
                    return Err(Halt::Stopped(stop_reason_of(&command)));
                }
                InterventionKind::Pause | InterventionKind::AdHocQuestion => {
                    self.deferred.push_back(command)
                }
                _ => debug!(
                    session_id = %self.session.id,
                    kind = %command.kind,
                    "Ignored while awaiting human input"
                ),
            }
        };
        self.session.pending_human = None;

        match submission {
            Some(text) => {
                let quality_context = QualityContext {
                    phase: turn.phase,
                    speaker: turn.speaker,
                    kind: turn.kind,
                    settings: &self.session.settings(),
                    ad_hoc: false,
                };
                let findings = self.gate.evaluate(&text, &quality_context);
                let utterance = self.record(&turn, text, findings, 1, false);
                self.append(utterance).await?;
                Ok(())
            }
            None => {
                let timeout = TimeoutError {
                    side,
                    phase: turn.phase,
                    waited_secs: seat.deadline_secs.unwrap_or_default(),
                };
                warn!(
                    session_id = %self.session.id,
                    error = %timeout,
                    fallback = ?seat.on_timeout,
                    "Human input deadline elapsed"
                );
                match seat.on_timeout {
                    TimeoutFallback::SkipTurn => Ok(()),
                    TimeoutFallback::FailSession => Err(Halt::Failed(
                        OrchestratorError::turn_failed(turn.phase, turn.speaker, 0, timeout.to_string()),
                    )),
                }
            }
        }
    }

    /// Answer an observer question in the current phase without moving the cursor.
    async fn answer_ad_hoc(&mut self, command: PendingIntervention) -> Result<(), Halt> {
        let question = command.payload.clone().unwrap_or_default();
        let target = command.target.unwrap_or(SpeakerRole::Moderator);
        let agent = match self.roster.get(target) {
            Ok(agent) => agent,
            Err(e) => {
                warn!(
                    session_id = %self.session.id,
                    intervention_id = %command.id,
                    error = %e,
                    "Ad-hoc question dropped"
                );
                return Ok(());
            }
        };

        let phase = match self.session.cursor.phase {
            DebatePhase::Completed => DebatePhase::Synthesis,
            phase => phase,
        };
        let turn = Turn {
            phase,
            speaker: target,
            kind: TurnKind::Answer,
            focus: None,
        };
        let context =
            TurnContext::build(&self.session, &turn, &self.history).with_ad_hoc_question(&question);

        match self.generate(agent.as_ref(), &context, true).await {
            RetryOutcome::Success {
                value: (text, findings),
                attempts,
            } => {
                let utterance = self.record(&turn, text, findings, attempts, true);
                self.append(utterance).await?;
            }
            RetryOutcome::Failed {
                error: AgentError::Cancelled,
                ..
            } => return Err(Halt::Stopped(self.stop_reason())),
            RetryOutcome::Failed { error, attempts } => {
                warn!(
                    session_id = %self.session.id,
                    intervention_id = %command.id,
                    error = %error,
                    attempts,
                    "Ad-hoc question could not be answered"
                );
            }
        }
        Ok(())
    }

    fn record(
        &self,
        turn: &Turn,
        text: String,
        quality: Vec<QualityWarning>,
        attempts: u32,
        ad_hoc: bool,
    ) -> Utterance {
        let metadata = UtteranceMetadata {
            evidence: classify_evidence(&text),
            assumptions: extract_assumptions(&text),
            quality,
            focus: turn.focus,
            ad_hoc,
            attempts,
        };
        Utterance::new(
            self.session.id,
            self.session.next_sequence(),
            turn.speaker,
            turn.phase,
            turn.kind,
            text,
        )
        .with_metadata(metadata)
    }

    /// Append durably, then publish. Nothing is published for a failed append.
    async fn append(&mut self, utterance: Utterance) -> Result<(), OrchestratorError> {
        self.store.append(&utterance).await?;

        for finding in &utterance.metadata.quality {
            warn!(
                session_id = %self.session.id,
                sequence = utterance.sequence,
                speaker = %utterance.speaker,
                check = %finding.check,
                severity = ?finding.severity,
                message = %finding.message,
                "Quality finding attached"
            );
        }

        self.session.last_sequence = utterance.sequence;
        self.history.push(utterance.clone());
        self.trim_history();
        self.hub.publish(Event::TurnComplete { utterance });
        Ok(())
    }

    fn trim_history(&mut self) {
        let excess = self.history.len().saturating_sub(PRIOR_UTTERANCE_LIMIT);
        self.history.drain(..excess);
    }

    async fn complete(&mut self) {
        if let Err(e) =
            PhaseStateMachine::validate_status_transition(self.session.status, SessionStatus::Completed)
        {
            self.fail(e.to_string()).await;
            return;
        }

        self.session.complete();
        self.sync().await;
        self.hub.publish(Event::SessionCompleted {
            utterance_count: self.session.last_sequence,
        });
        info!(
            session_id = %self.session.id,
            utterances = self.session.last_sequence,
            "Session completed"
        );
    }

    async fn fail(&mut self, reason: String) {
        if self.session.status.is_terminal() {
            return;
        }
        self.session.fail(reason.clone());
        self.sync().await;
        self.hub.publish(Event::SessionFailed {
            reason,
            status: SessionStatus::Failed,
        });
    }

    /// Publish the snapshot and persist the session record.
    async fn sync(&mut self) {
        self.snapshot.send_replace(self.session.clone());

        if let Some(repository) = &self.repository {
            if let Err(e) = repository.update(&self.session).await {
                warn!(
                    session_id = %self.session.id,
                    error = %e,
                    "Failed to persist session record"
                );
            }
        }
    }
}

fn stop_reason_of(command: &PendingIntervention) -> String {
    command
        .payload
        .as_deref()
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .unwrap_or(DEFAULT_STOP_REASON)
        .to_string()
}

fn normalize_question(text: &str) -> Option<String> {
    let question = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    (!question.is_empty()).then(|| question.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedAgent;
    use crate::transcript::InMemoryTranscriptStore;
    use debate_core::SessionConfig;

    fn services() -> SessionServices {
        SessionServices::new(
            AgentRoster::scripted(),
            Arc::new(InMemoryTranscriptStore::new()),
        )
        .with_retry(RetryPolicy {
            initial_backoff_ms: 1,
            ..RetryPolicy::default()
        })
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("\n  \"Should cities ban cars?\"\nExtra"),
            Some("Should cities ban cars?".to_string())
        );
        assert_eq!(normalize_question("   "), None);
    }

    #[test]
    fn test_stop_reason_of() {
        let command = PendingIntervention::new(InterventionKind::Stop).with_payload("  budget  ");
        assert_eq!(stop_reason_of(&command), "budget");
        assert_eq!(
            stop_reason_of(&PendingIntervention::new(InterventionKind::Stop)),
            DEFAULT_STOP_REASON
        );
    }

    #[tokio::test]
    async fn test_normalizer_sets_question() {
        let services = services();
        let session = Session::new(SessionConfig::new("Four-day weeks raise productivity."));
        let (handle, task) = SessionOrchestrator::spawn(session, &services);

        let finished = task.await.unwrap();
        assert_eq!(finished.status, SessionStatus::Completed);
        assert_eq!(
            finished.normalized_question.as_deref(),
            Some("Should we accept that four-day weeks raise productivity?")
        );
        assert_eq!(finished.last_sequence, 18);
        assert_eq!(handle.snapshot().status, SessionStatus::Completed);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_empty_reply_retried_once() {
        let store = Arc::new(InMemoryTranscriptStore::new());
        let pro = Arc::new(ScriptedAgent::new("pro").with_reply("   "));
        let services = SessionServices::new(
            AgentRoster::scripted().with(SpeakerRole::PRO, pro.clone()),
            store.clone(),
        )
        .with_retry(RetryPolicy {
            initial_backoff_ms: 1,
            ..RetryPolicy::default()
        });

        let session = Session::new(SessionConfig::new("p").with_normalize(false));
        let session_id = session.id;
        let (_handle, task) = SessionOrchestrator::spawn(session, &services);
        let finished = task.await.unwrap();

        assert_eq!(finished.status, SessionStatus::Completed);
        let first = &store.history(session_id, 0).await.unwrap()[0];
        assert_eq!(first.speaker, SpeakerRole::PRO);
        assert_eq!(first.metadata.attempts, 2);
        assert!(!first.text.trim().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_agent_fails_session() {
        let con = Arc::new(ScriptedAgent::new("con").with_failures([
            AgentError::request("upstream down", Some(503)),
            AgentError::request("upstream down", Some(503)),
        ]));
        let services = SessionServices::new(
            AgentRoster::scripted().with(SpeakerRole::CON, con),
            Arc::new(InMemoryTranscriptStore::new()),
        )
        .with_retry(RetryPolicy {
            initial_backoff_ms: 1,
            ..RetryPolicy::default()
        });

        let session = Session::new(SessionConfig::new("p").with_normalize(false));
        let (_handle, task) = SessionOrchestrator::spawn(session, &services);
        let finished = task.await.unwrap();

        assert_eq!(finished.status, SessionStatus::Failed);
        assert_eq!(finished.last_sequence, 1);
        let error = finished.error.unwrap();
        assert!(error.contains("con in opening"), "{error}");
        assert!(error.contains("upstream down"), "{error}");
    }

    #[tokio::test]
    async fn test_human_turn_for_superseded_request_dropped() {
        let store = Arc::new(InMemoryTranscriptStore::new());
        let services = SessionServices::new(AgentRoster::scripted(), store.clone());
        let config = SessionConfig::new("p")
            .with_normalize(false)
            .with_human(debate_core::HumanSeat {
                side: Side::Pro,
                deadline_secs: None,
                on_timeout: TimeoutFallback::SkipTurn,
            });
        let session = Session::new(config);
        let session_id = session.id;
        let (handle, task) = SessionOrchestrator::spawn(session, &services);

        let waiting = handle.wait_until(|s| s.pending_human.is_some()).await;
        let open = waiting.pending_human.unwrap();

        handle
            .enqueue(
                PendingIntervention::new(InterventionKind::HumanTurn)
                    .with_payload("Meant for an earlier request.")
                    .with_reply_to(Uuid::new_v4()),
            )
            .unwrap();
        handle
            .enqueue(
                PendingIntervention::new(InterventionKind::HumanTurn)
                    .with_payload("Cars crowd out people.")
                    .with_reply_to(open.id),
            )
            .unwrap();

        let next = handle
            .wait_until(|s| s.pending_human.as_ref().is_some_and(|r| r.id != open.id))
            .await;
        assert_eq!(next.last_sequence, 2);
        handle
            .enqueue(PendingIntervention::new(InterventionKind::Stop).with_payload("done"))
            .unwrap();
        let finished = task.await.unwrap();

        assert_eq!(finished.error.as_deref(), Some("done"));
        let transcript = store.history(session_id, 0).await.unwrap();
        assert_eq!(transcript[0].text, "Cars crowd out people.");
        assert!(transcript
            .iter()
            .all(|u| u.text != "Meant for an earlier request."));
    }

    #[tokio::test]
    async fn test_missing_agent_fails_session() {
        let services = SessionServices::new(
            AgentRoster::new(),
            Arc::new(InMemoryTranscriptStore::new()),
        );
        let session = Session::new(SessionConfig::new("p"));
        let (_handle, task) = SessionOrchestrator::spawn(session, &services);

        let finished = task.await.unwrap();
        assert_eq!(finished.status, SessionStatus::Failed);
        assert!(finished.error.unwrap().contains("no agent registered"));
    }
}
