use async_trait::async_trait;
use interview_core::model::{RoundId, SessionId, SessionSnapshot};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::RemoteError;
use crate::session::{RoundSubmission, SessionRemote};

/// Round order enforced by the interview backend.
pub const DEFAULT_PIPELINE: [&str; 9] = [
    "resume_analysis",
    "prep_oa",
    "oa_mcq",
    "prep_coding",
    "oa_coding",
    "prep_tech_1",
    "tech_1",
    "prep_tech_2",
    "tech_2",
];

/// Remote operations, used for call counting and scripted failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    FetchState,
    Advance,
    SubmitRound,
}

#[derive(Debug, Clone)]
struct SessionRecord {
    rounds: Vec<RoundId>,
    position: usize,
    submissions: Vec<RoundSubmission>,
}

impl SessionRecord {
    fn snapshot(&self) -> SessionSnapshot {
        match self.rounds.get(self.position) {
            Some(round) => SessionSnapshot::active(round.clone()),
            None => SessionSnapshot::Completed,
        }
    }

    fn step(&mut self) {
        if self.position < self.rounds.len() {
            self.position += 1;
        }
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    calls: HashMap<RemoteOp, usize>,
    failures: VecDeque<(RemoteOp, u16)>,
}

/// In-memory session service for tests and offline runs.
///
/// Mirrors the backend's strict pipeline and can inject failures and latency.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    inner: Arc<Mutex<Inner>>,
    latency: Option<Duration>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, so tests can observe requests while they are in flight.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Register a session following the default backend pipeline.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Connection` if the internal lock is poisoned.
    pub fn create_session(&self, id: SessionId) -> Result<(), RemoteError> {
        let rounds = DEFAULT_PIPELINE
            .iter()
            .filter_map(|raw| RoundId::new(*raw).ok())
            .collect();
        self.create_session_with_rounds(id, rounds)
    }

    /// Register a session with a custom round order. An empty order is already completed.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Connection` if the internal lock is poisoned.
    pub fn create_session_with_rounds(
        &self,
        id: SessionId,
        rounds: Vec<RoundId>,
    ) -> Result<(), RemoteError> {
        let mut guard = self.lock()?;
        guard.sessions.insert(
            id,
            SessionRecord {
                rounds,
                position: 0,
                submissions: Vec::new(),
            },
        );
        Ok(())
    }

    /// Make the next call of `op` fail with the given HTTP status.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Connection` if the internal lock is poisoned.
    pub fn fail_next(&self, op: RemoteOp, status: u16) -> Result<(), RemoteError> {
        self.lock()?.failures.push_back((op, status));
        Ok(())
    }

    /// Number of calls made for `op`, including failed ones.
    #[must_use]
    pub fn calls(&self, op: RemoteOp) -> usize {
        self.inner
            .lock()
            .map(|guard| guard.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Submissions recorded for a session, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::NotFound` for unknown sessions.
    pub fn submissions(&self, id: SessionId) -> Result<Vec<RoundSubmission>, RemoteError> {
        let guard = self.lock()?;
        guard
            .sessions
            .get(&id)
            .map(|record| record.submissions.clone())
            .ok_or(RemoteError::NotFound)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, RemoteError> {
        self.inner
            .lock()
            .map_err(|e| RemoteError::Connection(e.to_string()))
    }

    async fn enter(&self, op: RemoteOp) -> Result<(), RemoteError> {
        {
            let mut guard = self.lock()?;
            *guard.calls.entry(op).or_insert(0) += 1;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut guard = self.lock()?;
        let scripted = guard
            .failures
            .iter()
            .position(|(failing, _)| *failing == op)
            .and_then(|index| guard.failures.remove(index));
        match scripted {
            Some((_, status)) => Err(RemoteError::Status { status }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionRemote for InMemoryRemote {
    async fn fetch_state(&self, session: SessionId) -> Result<SessionSnapshot, RemoteError> {
        self.enter(RemoteOp::FetchState).await?;
        let guard = self.lock()?;
        guard
            .sessions
            .get(&session)
            .map(SessionRecord::snapshot)
            .ok_or(RemoteError::NotFound)
    }

    async fn advance(&self, session: SessionId) -> Result<(), RemoteError> {
        self.enter(RemoteOp::Advance).await?;
        let mut guard = self.lock()?;
        let record = guard
            .sessions
            .get_mut(&session)
            .ok_or(RemoteError::NotFound)?;
        record.step();
        Ok(())
    }

    async fn submit_round(
        &self,
        session: SessionId,
        submission: &RoundSubmission,
    ) -> Result<(), RemoteError> {
        self.enter(RemoteOp::SubmitRound).await?;
        let mut guard = self.lock()?;
        let record = guard
            .sessions
            .get_mut(&session)
            .ok_or(RemoteError::NotFound)?;
        if record.snapshot().is_completed() {
            return Err(RemoteError::Conflict);
        }
        record.submissions.push(submission.clone());
        record.step();
        Ok(())
    }
}
