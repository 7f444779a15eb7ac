use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::time::Instant;

use interview_core::model::{FlowTimings, SessionId, SessionSnapshot};
use remote::{RemoteError, SessionRemote};

use super::view::RoundView;
use crate::error::ControllerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Initializing,
    Ready,
    Transitioning,
    Completed,
}

/// Identifies one displayed round; signals carrying an older ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoundTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Remote state applied; `changed` is false when the server kept the same round.
    Applied { changed: bool },
    Completed,
    /// Dropped: another request is in flight, the ticket is stale, or the
    /// controller is not showing a round.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Advance,
    Refresh,
}

struct ControllerState {
    phase: ControllerPhase,
    snapshot: Option<SessionSnapshot>,
    view: Option<RoundView>,
    epoch: u64,
    /// Epoch whose `advance` the service already accepted.
    advanced: Option<u64>,
    in_flight: bool,
    last_error: Option<String>,
}

/// Sequences the candidate through server-ordered rounds.
///
/// The remote service is the single source of truth: the local round only
/// changes after the service confirms it, and at most one remote transition is
/// in flight at a time.
pub struct RoundController {
    session: SessionId,
    remote: Arc<dyn SessionRemote>,
    timings: FlowTimings,
    state: Mutex<ControllerState>,
}

impl RoundController {
    #[must_use]
    pub fn new(session: SessionId, remote: Arc<dyn SessionRemote>, timings: FlowTimings) -> Self {
        Self {
            session,
            remote,
            timings,
            state: Mutex::new(ControllerState {
                phase: ControllerPhase::Initializing,
                snapshot: None,
                view: None,
                epoch: 0,
                advanced: None,
                in_flight: false,
                last_error: None,
            }),
        }
    }

    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    #[must_use]
    pub fn timings(&self) -> &FlowTimings {
        &self.timings
    }

    #[must_use]
    pub fn phase(&self) -> ControllerPhase {
        self.lock().phase
    }

    /// Last remote state the controller applied.
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.lock().snapshot.clone()
    }

    /// The round on screen, available only while `Ready`.
    #[must_use]
    pub fn current(&self) -> Option<(RoundTicket, RoundView)> {
        let state = self.lock();
        if state.phase != ControllerPhase::Ready {
            return None;
        }
        state
            .view
            .clone()
            .map(|view| (RoundTicket(state.epoch), view))
    }

    /// Message of the most recent failed remote call, cleared on success.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Load the session state for the first time.
    ///
    /// Safe to call again after a failure; once initialised it just reports
    /// the current phase.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Remote` if the state cannot be fetched; the
    /// controller stays in `Initializing`.
    pub async fn initialize(&self) -> Result<ControllerPhase, ControllerError> {
        {
            let mut state = self.lock();
            if state.phase != ControllerPhase::Initializing || state.in_flight {
                return Ok(state.phase);
            }
            state.in_flight = true;
        }

        match self.remote.fetch_state(self.session).await {
            Ok(snapshot) => {
                let mut state = self.lock();
                state.in_flight = false;
                apply(&mut state, snapshot, &self.timings);
                tracing::info!(session = %self.session, phase = ?state.phase, "session loaded");
                Ok(state.phase)
            }
            Err(err) => {
                let mut state = self.lock();
                state.in_flight = false;
                state.last_error = Some(err.to_string());
                tracing::warn!(session = %self.session, error = %err, "failed to fetch session state");
                Err(err.into())
            }
        }
    }

    /// Advance past an interstitial (prep or resume analysis).
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::WrongRoundKind` for task rounds and
    /// `ControllerError::Remote` when the service call fails; the current
    /// round then stays in place and the phase returns to `Ready`.
    pub async fn advance(&self, ticket: RoundTicket) -> Result<TransitionOutcome, ControllerError> {
        self.transition(ticket, Request::Advance).await
    }

    /// Refresh state after a task round submitted its results.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::WrongRoundKind` for interstitials and
    /// `ControllerError::Remote` when the refresh fails.
    pub async fn complete_task(
        &self,
        ticket: RoundTicket,
    ) -> Result<TransitionOutcome, ControllerError> {
        self.transition(ticket, Request::Refresh).await
    }

    async fn transition(
        &self,
        ticket: RoundTicket,
        request: Request,
    ) -> Result<TransitionOutcome, ControllerError> {
        {
            let mut state = self.lock();
            if state.phase != ControllerPhase::Ready || state.in_flight || state.epoch != ticket.0
            {
                tracing::debug!(?request, phase = ?state.phase, "transition request ignored");
                return Ok(TransitionOutcome::Ignored);
            }
            if let Some(view) = state.view.as_ref() {
                check_request(view, request)?;
            }
            state.in_flight = true;
            state.phase = ControllerPhase::Transitioning;
        }

        let started = Instant::now();
        let result = self.request(request, ticket).await;

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let mut state = self.lock();
                state.in_flight = false;
                state.phase = ControllerPhase::Ready;
                state.last_error = Some(err.to_string());
                tracing::warn!(
                    session = %self.session,
                    ?request,
                    error = %err,
                    "transition failed; staying on current round"
                );
                return Err(err.into());
            }
        };

        tokio::time::sleep_until(started + self.timings.transition_min()).await;

        let mut state = self.lock();
        state.in_flight = false;
        let changed = apply(&mut state, snapshot, &self.timings);
        if state.phase == ControllerPhase::Completed {
            tracing::info!(session = %self.session, "interview completed");
            return Ok(TransitionOutcome::Completed);
        }
        if changed {
            if let Some(view) = state.view.as_ref() {
                tracing::info!(session = %self.session, round = %view.round(), "entered round");
            }
        }
        Ok(TransitionOutcome::Applied { changed })
    }

    /// `advance` moves the server pointer on every call, so it is sent at
    /// most once per round; a retry after a failed fetch only refetches.
    async fn request(
        &self,
        request: Request,
        ticket: RoundTicket,
    ) -> Result<SessionSnapshot, RemoteError> {
        if request == Request::Advance {
            let already_advanced = self.lock().advanced == Some(ticket.0);
            if already_advanced {
                tracing::debug!(session = %self.session, "advance already accepted; refetching state");
            } else {
                self.remote.advance(self.session).await?;
                self.lock().advanced = Some(ticket.0);
            }
        }
        self.remote.fetch_state(self.session).await
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RoundController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RoundController")
            .field("session", &self.session)
            .field("phase", &state.phase)
            .field("view", &state.view)
            .finish_non_exhaustive()
    }
}

fn check_request(view: &RoundView, request: Request) -> Result<(), ControllerError> {
    let allowed = match request {
        Request::Advance => view.interstitial_countdown().is_some(),
        Request::Refresh => view.task().is_some(),
    };
    if allowed {
        return Ok(());
    }
    Err(ControllerError::WrongRoundKind {
        round: view.round().clone(),
        action: match request {
            Request::Advance => "advanced",
            Request::Refresh => "completed as a task",
        },
    })
}

/// Install a confirmed remote snapshot. Returns true when the round changed.
fn apply(state: &mut ControllerState, snapshot: SessionSnapshot, timings: &FlowTimings) -> bool {
    state.last_error = None;
    let previous = state.view.as_ref().map(|view| view.round().clone());
    let changed = match &snapshot {
        SessionSnapshot::Completed => {
            state.phase = ControllerPhase::Completed;
            state.view = None;
            true
        }
        SessionSnapshot::Active { current_round } => {
            state.phase = ControllerPhase::Ready;
            let changed = previous.as_ref() != Some(current_round);
            if changed {
                state.view = Some(RoundView::for_round(current_round, timings));
            }
            changed
        }
    };
    if changed {
        state.epoch += 1;
    }
    state.snapshot = Some(snapshot);
    changed
}
