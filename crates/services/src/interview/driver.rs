use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;

use interview_core::Clock;
use interview_core::model::{FlowTimings, ProctoringPolicy, RoundId, SessionId, TaskKind};
use remote::{RoundSubmission, SessionRemote};

use super::controller::{ControllerPhase, RoundController, RoundTicket, TransitionOutcome};
use super::submission::{SubmissionGuard, SubmissionLatch, SubmissionState};
use super::view::RoundView;
use crate::env::{Capabilities, PresentationMode, SpeechInput, SpeechOutput};
use crate::error::{CapabilityError, ControllerError, DriverError};
use crate::proctoring::{MonitorHandle, ProctoringMonitor};
use crate::timer::CountdownHandle;

/// Why a task round was submitted on the candidate's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceReason {
    TimeUp,
    Terminated,
}

impl ForceReason {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TimeUp => "time_up",
            Self::Terminated => "proctoring_violation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    CountdownExpired,
    TaskCompleted,
    Forced(ForceReason),
}

#[derive(Debug, Clone, Copy)]
struct RoundEvent {
    ticket: RoundTicket,
    kind: EventKind,
}

#[derive(Clone)]
struct Speech {
    output: Arc<dyn SpeechOutput>,
    input: Arc<dyn SpeechInput>,
}

/// Handed to the presenter with each round.
#[derive(Clone)]
pub struct RoundContext {
    ticket: RoundTicket,
    events: UnboundedSender<RoundEvent>,
    proctoring: Option<ProctoringMonitor>,
    submission: SubmissionLatch,
    speech: Option<Speech>,
}

impl RoundContext {
    /// Signal that the task submitted its results. Extra calls are harmless.
    pub fn complete(&self) {
        let _ = self.events.send(RoundEvent {
            ticket: self.ticket,
            kind: EventKind::TaskCompleted,
        });
    }

    /// Claim the round's submission before sending answers.
    ///
    /// Returns `None` while another submission for this round is in flight,
    /// including one made on the candidate's behalf, or after one succeeded.
    pub fn begin_submission(&self) -> Option<SubmissionGuard> {
        self.submission.try_begin()
    }

    #[must_use]
    pub fn submission_state(&self) -> SubmissionState {
        self.submission.state()
    }

    /// Read `text` aloud. Only chat rounds carry speech.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::Unsupported` outside chat rounds or when the
    /// host has no speech synthesis.
    pub fn speak(&self, text: &str) -> Result<(), CapabilityError> {
        match &self.speech {
            Some(speech) => speech.output.speak(text),
            None => Err(CapabilityError::Unsupported("speech output")),
        }
    }

    /// Start recognizing the candidate's spoken answer.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityError::Unsupported` outside chat rounds or when the
    /// host has no recognizer.
    pub fn listen(&self) -> Result<(), CapabilityError> {
        match &self.speech {
            Some(speech) => speech.input.start(),
            None => Err(CapabilityError::Unsupported("speech input")),
        }
    }

    #[must_use]
    pub fn ticket(&self) -> RoundTicket {
        self.ticket
    }

    /// Monitor watching this round, for warning and violation readouts.
    #[must_use]
    pub fn proctoring(&self) -> Option<&ProctoringMonitor> {
        self.proctoring.as_ref()
    }
}

impl fmt::Debug for RoundContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundContext")
            .field("ticket", &self.ticket)
            .field("proctored", &self.proctoring.is_some())
            .field("speech", &self.speech.is_some())
            .field("submission", &self.submission.state())
            .finish()
    }
}

/// Presentation layer driven by the session.
pub trait RoundPresenter: Send + Sync {
    fn show_loading(&self) {}

    /// Render a round. Task views submit under
    /// [`RoundContext::begin_submission`] and call [`RoundContext::complete`]
    /// once the service accepted their results.
    fn show_round(&self, view: &RoundView, context: RoundContext);

    fn show_transition(&self) {}

    fn show_error(&self, _message: &str) {}

    fn show_completed(&self) {}

    /// Progress of an unfinished task, sent with forced submissions.
    fn task_progress(&self, _round: &RoundId) -> Value {
        Value::Null
    }

    fn navigate_to_results(&self, session: SessionId);
}

/// Rounds seen during one run and those ended on the candidate's behalf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub visited: Vec<RoundId>,
    pub forced: Vec<(RoundId, ForceReason)>,
}

struct ScrollLock(Arc<dyn PresentationMode>);

impl ScrollLock {
    fn engage(presentation: Arc<dyn PresentationMode>) -> Self {
        presentation.set_scroll_locked(true);
        Self(presentation)
    }
}

impl Drop for ScrollLock {
    fn drop(&mut self) {
        self.0.set_scroll_locked(false);
    }
}

struct SpeechGuard(Speech);

impl Drop for SpeechGuard {
    fn drop(&mut self) {
        self.0.input.abort();
        self.0.output.cancel();
    }
}

/// Resources owned by the round on screen; all released when it is dropped.
#[derive(Default)]
struct RoundScope {
    retry: Option<JoinHandle<()>>,
    countdown: Option<CountdownHandle>,
    monitor_handle: Option<MonitorHandle>,
    monitor: Option<ProctoringMonitor>,
    speech: Option<SpeechGuard>,
    submission: SubmissionLatch,
    forced: bool,
    pending_submit: Option<ForceReason>,
}

impl Drop for RoundScope {
    fn drop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }
}

/// Runs a session from first fetch to the results hand-off.
pub struct SessionDriver {
    controller: Arc<RoundController>,
    remote: Arc<dyn SessionRemote>,
    capabilities: Capabilities,
    policy: ProctoringPolicy,
    clock: Clock,
    presenter: Arc<dyn RoundPresenter>,
}

impl SessionDriver {
    #[must_use]
    pub fn new(
        session: SessionId,
        remote: Arc<dyn SessionRemote>,
        capabilities: Capabilities,
        presenter: Arc<dyn RoundPresenter>,
    ) -> Self {
        Self {
            controller: Arc::new(RoundController::new(
                session,
                Arc::clone(&remote),
                FlowTimings::default(),
            )),
            remote,
            capabilities,
            policy: ProctoringPolicy::default(),
            clock: Clock::default_clock(),
            presenter,
        }
    }

    #[must_use]
    pub fn with_timings(mut self, timings: FlowTimings) -> Self {
        self.controller = Arc::new(RoundController::new(
            self.controller.session(),
            Arc::clone(&self.remote),
            timings,
        ));
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ProctoringPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn controller(&self) -> Arc<RoundController> {
        Arc::clone(&self.controller)
    }

    /// Drive the session until the service reports completion, then hand off
    /// to the results view.
    ///
    /// # Errors
    ///
    /// Returns `DriverError::Controller` if the first fetch fails (calling
    /// `run` again retries it) or the service rejects a transition with a
    /// non-transient error, and `DriverError::UnknownRound` when the service
    /// reports a round this client cannot present.
    pub async fn run(&self) -> Result<DriverReport, DriverError> {
        let session = self.controller.session();
        self.presenter.show_loading();
        if let Err(err) = self.controller.initialize().await {
            self.presenter.show_error(&err.to_string());
            return Err(err.into());
        }

        let (events, mut inbox) = unbounded_channel();
        let mut report = DriverReport::default();
        let scroll = ScrollLock::engage(Arc::clone(&self.capabilities.presentation));

        while self.controller.phase() != ControllerPhase::Completed {
            let Some((ticket, view)) = self.controller.current() else {
                return Err(DriverError::NotReady);
            };
            if let RoundView::Unknown { round } = &view {
                self.presenter.show_error(&format!("Unknown State: {round}"));
                return Err(DriverError::UnknownRound(round.clone()));
            }

            report.visited.push(view.round().clone());
            let mut scope = self.open_scope(ticket, &view, &events);
            self.presenter.show_round(
                &view,
                RoundContext {
                    ticket,
                    events: events.clone(),
                    proctoring: scope.monitor.clone(),
                    submission: scope.submission.clone(),
                    speech: scope.speech.as_ref().map(|guard| guard.0.clone()),
                },
            );
            self.await_transition(ticket, &view, &mut scope, &events, &mut inbox, &mut report)
                .await?;
        }

        drop(scroll);
        self.presenter.show_completed();
        tokio::time::sleep(self.controller.timings().completion_redirect()).await;
        self.presenter.navigate_to_results(session);
        Ok(report)
    }

    fn open_scope(
        &self,
        ticket: RoundTicket,
        view: &RoundView,
        events: &UnboundedSender<RoundEvent>,
    ) -> RoundScope {
        let mut scope = RoundScope::default();
        if let Some(countdown) = view.interstitial_countdown() {
            scope.countdown = Some(CountdownHandle::start(
                countdown,
                notify(events, ticket, EventKind::CountdownExpired),
            ));
        }

        if let RoundView::Task {
            task, time_limit, ..
        } = view
        {
            if let Some(limit) = time_limit {
                scope.countdown = Some(CountdownHandle::start(
                    *limit,
                    notify(events, ticket, EventKind::Forced(ForceReason::TimeUp)),
                ));
            }

            let monitor = ProctoringMonitor::new(&self.capabilities, self.policy.clone(), self.clock);
            scope.monitor_handle = monitor.start(
                self.policy.enabled(),
                notify(events, ticket, EventKind::Forced(ForceReason::Terminated)),
            );
            if scope.monitor_handle.is_some() {
                scope.monitor = Some(monitor);
            }

            if *task == TaskKind::TechnicalChat {
                scope.speech = Some(SpeechGuard(Speech {
                    output: Arc::clone(&self.capabilities.speech_output),
                    input: Arc::clone(&self.capabilities.speech_input),
                }));
            }
        }
        scope
    }

    async fn await_transition(
        &self,
        ticket: RoundTicket,
        view: &RoundView,
        scope: &mut RoundScope,
        events: &UnboundedSender<RoundEvent>,
        inbox: &mut UnboundedReceiver<RoundEvent>,
        report: &mut DriverReport,
    ) -> Result<(), DriverError> {
        loop {
            let Some(event) = inbox.recv().await else {
                return Err(DriverError::Interrupted);
            };
            if event.ticket != ticket {
                tracing::debug!(kind = ?event.kind, "dropped event from a previous round");
                continue;
            }

            let kind = match event.kind {
                EventKind::Forced(_) if scope.forced => EventKind::TaskCompleted,
                other => other,
            };

            self.presenter.show_transition();
            let result = match kind {
                EventKind::CountdownExpired => self.controller.advance(ticket).await,
                EventKind::TaskCompleted => {
                    if let Some(reason) = scope.pending_submit.take() {
                        self.force_submit(view, scope, reason).await;
                    }
                    self.controller.complete_task(ticket).await
                }
                EventKind::Forced(reason) => {
                    scope.forced = true;
                    report.forced.push((view.round().clone(), reason));
                    self.force_submit(view, scope, reason).await;
                    self.controller.complete_task(ticket).await
                }
            };

            match result {
                Ok(TransitionOutcome::Completed | TransitionOutcome::Applied { changed: true }) => {
                    return Ok(());
                }
                Ok(TransitionOutcome::Ignored) => {}
                Ok(TransitionOutcome::Applied { changed: false }) => {
                    tracing::warn!(round = %view.round(), "service still reports the same round; retrying");
                    self.schedule_retry(ticket, view, scope, events);
                }
                Err(ControllerError::Remote(err)) if err.is_transient() => {
                    tracing::warn!(round = %view.round(), error = %err, "round transition failed; retrying");
                    self.schedule_retry(ticket, view, scope, events);
                }
                Err(err) => {
                    tracing::error!(round = %view.round(), error = %err, "round transition rejected");
                    self.presenter.show_error(&err.to_string());
                    return Err(err.into());
                }
            }
        }
    }

    fn schedule_retry(
        &self,
        ticket: RoundTicket,
        view: &RoundView,
        scope: &mut RoundScope,
        events: &UnboundedSender<RoundEvent>,
    ) {
        let kind = if view.interstitial_countdown().is_some() {
            EventKind::CountdownExpired
        } else {
            EventKind::TaskCompleted
        };
        let delay = self.controller.timings().retry_delay();
        let fire = notify(events, ticket, kind);
        if let Some(previous) = scope.retry.take() {
            previous.abort();
        }
        scope.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire();
        }));
    }

    /// Best-effort submission of an unfinished task. A transient failure is
    /// retried with the next refresh; the round still moves towards its end.
    ///
    /// Skipped once the round was submitted. While the candidate's own
    /// submission is in flight it is deferred to the next refresh.
    async fn force_submit(&self, view: &RoundView, scope: &mut RoundScope, reason: ForceReason) {
        let round = view.round().clone();
        let Some(guard) = scope.submission.try_begin() else {
            if scope.submission.state() == SubmissionState::InFlight {
                tracing::debug!(%round, "submission in flight; deferring forced submission");
                scope.pending_submit = Some(reason);
            } else {
                tracing::debug!(%round, "round already submitted");
            }
            return;
        };

        let mut submission = RoundSubmission::new(round.clone())
            .with_payload(self.presenter.task_progress(&round))
            .with_field("auto_submitted", Value::Bool(true))
            .with_field("reason", Value::from(reason.label()));
        if let Some(monitor) = scope.monitor.as_ref() {
            submission = submission.with_field("proctoring", proctoring_report(monitor));
        }

        match self
            .remote
            .submit_round(self.controller.session(), &submission)
            .await
        {
            Ok(()) => {
                guard.accepted();
                tracing::info!(%round, reason = reason.label(), "round submitted on candidate's behalf");
            }
            Err(err) => {
                drop(guard);
                tracing::warn!(%round, error = %err, "forced submission failed; ending round anyway");
                if err.is_transient() {
                    scope.pending_submit = Some(reason);
                }
            }
        }
    }
}

impl fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDriver")
            .field("controller", &self.controller)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn notify(
    events: &UnboundedSender<RoundEvent>,
    ticket: RoundTicket,
    kind: EventKind,
) -> impl FnOnce() + Send + 'static {
    let events = events.clone();
    move || {
        let _ = events.send(RoundEvent { ticket, kind });
    }
}

fn proctoring_report(monitor: &ProctoringMonitor) -> Value {
    let snapshot = monitor.snapshot();
    json!({
        "violation_count": snapshot.escalation,
        "terminated": snapshot.terminated,
        "violations": serde_json::to_value(snapshot.tally).unwrap_or(Value::Null),
        "log": serde_json::to_value(monitor.violation_log()).unwrap_or(Value::Null),
    })
}
