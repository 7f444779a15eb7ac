use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::time::Instant;

use interview_core::Clock;
use interview_core::model::{ProctoringPolicy, ViolationRecord, ViolationTally, Warning};

use super::state::{Observation, ProctorState, classify_signal};
use crate::env::{
    Capabilities, EnvSignal, Environment, Listener, ListenerId, PresentationMode, SignalKind,
};

type TerminateHook = Box<dyn FnOnce() + Send>;

/// Observable proctoring state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProctoringSnapshot {
    pub active: bool,
    pub escalation: u32,
    pub tally: ViolationTally,
    pub warning: Option<Warning>,
    pub terminated: bool,
}

#[derive(Default)]
struct MonitorState {
    proctor: ProctorState,
    active: bool,
    /// Bumped on every start; handles only stop the run they started.
    generation: u64,
    listeners: Vec<ListenerId>,
    on_terminate: Option<TerminateHook>,
}

struct Shared {
    environment: Arc<dyn Environment>,
    policy: ProctoringPolicy,
    clock: Clock,
    state: Mutex<MonitorState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, signal: EnvSignal) {
        let Some(kind) = classify_signal(signal, &self.policy) else {
            return;
        };

        let (hook, detach) = {
            let mut state = self.lock();
            if !state.active {
                tracing::debug!(violation = kind.label(), "signal after monitoring ended; ignored");
                return;
            }
            let observation =
                state
                    .proctor
                    .observe(kind, &self.policy, Instant::now(), self.clock.now());
            match observation {
                Observation::Terminated => {
                    state.active = false;
                    (
                        state.on_terminate.take(),
                        std::mem::take(&mut state.listeners),
                    )
                }
                Observation::Cautioned => {
                    tracing::warn!(
                        violation = kind.label(),
                        escalation = state.proctor.escalation(),
                        "proctoring caution raised"
                    );
                    (None, Vec::new())
                }
                Observation::Recorded => {
                    tracing::debug!(violation = kind.label(), "violation recorded");
                    (None, Vec::new())
                }
                Observation::Ignored => (None, Vec::new()),
            }
        };

        for id in detach {
            self.environment.remove_listener(id);
        }
        if let Some(hook) = hook {
            tracing::info!(violation = kind.label(), "proctoring terminated the round");
            hook();
        }
    }

    fn stop(&self, generation: Option<u64>) {
        let listeners = {
            let mut state = self.lock();
            if generation.is_some_and(|generation| generation != state.generation) {
                tracing::debug!("stale monitor handle dropped; current run left alone");
                return;
            }
            let listeners = std::mem::take(&mut state.listeners);
            *state = MonitorState {
                generation: state.generation,
                ..MonitorState::default()
            };
            listeners
        };
        for id in listeners {
            self.environment.remove_listener(id);
        }
    }
}

/// Watches host signals during a task round and enforces the two-strike policy.
///
/// Create one monitor per round; escalation never carries over between rounds.
#[derive(Clone)]
pub struct ProctoringMonitor {
    shared: Arc<Shared>,
    presentation: Arc<dyn PresentationMode>,
}

impl ProctoringMonitor {
    #[must_use]
    pub fn new(capabilities: &Capabilities, policy: ProctoringPolicy, clock: Clock) -> Self {
        Self {
            shared: Arc::new(Shared {
                environment: Arc::clone(&capabilities.environment),
                policy,
                clock,
                state: Mutex::new(MonitorState::default()),
            }),
            presentation: Arc::clone(&capabilities.presentation),
        }
    }

    /// Begin monitoring and return the guard that keeps it alive.
    ///
    /// Returns `None` without side effects when `enable` is false, when the
    /// monitor is already active (listeners are never registered twice), or
    /// when it has terminated and not been stopped since.
    ///
    /// `on_terminate` runs at most once, when the escalation limit is reached.
    pub fn start<F>(&self, enable: bool, on_terminate: F) -> Option<MonitorHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if !enable {
            return None;
        }

        let generation = {
            let mut state = self.shared.lock();
            if state.active || state.proctor.is_terminated() {
                tracing::debug!("proctoring already running for this round");
                return None;
            }
            *state = MonitorState {
                active: true,
                generation: state.generation + 1,
                on_terminate: Some(Box::new(on_terminate)),
                ..MonitorState::default()
            };

            for kind in SignalKind::ALL {
                match self
                    .shared
                    .environment
                    .add_listener(kind, listener_for(Arc::downgrade(&self.shared)))
                {
                    Some(id) => state.listeners.push(id),
                    None => tracing::debug!(?kind, "signal source unavailable; detector disabled"),
                }
            }
            state.generation
        };

        if !self.presentation.is_fullscreen() {
            if let Err(err) = self.presentation.request_fullscreen() {
                tracing::warn!(error = %err, "fullscreen request denied or failed");
            }
        }

        Some(MonitorHandle {
            shared: Arc::clone(&self.shared),
            generation,
        })
    }

    /// Detach every listener and discard the round's counters.
    pub fn stop(&self) {
        self.shared.stop(None);
    }

    #[must_use]
    pub fn snapshot(&self) -> ProctoringSnapshot {
        let state = self.shared.lock();
        ProctoringSnapshot {
            active: state.active,
            escalation: state.proctor.escalation(),
            tally: state.proctor.tally(),
            warning: state.proctor.warning(&self.shared.policy, Instant::now()),
            terminated: state.proctor.is_terminated(),
        }
    }

    #[must_use]
    pub fn violation_log(&self) -> Vec<ViolationRecord> {
        self.shared.lock().proctor.log().to_vec()
    }

    #[must_use]
    pub fn policy(&self) -> &ProctoringPolicy {
        &self.shared.policy
    }
}

impl fmt::Debug for ProctoringMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProctoringMonitor")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

fn listener_for(shared: Weak<Shared>) -> Listener {
    Arc::new(move |signal| {
        if let Some(shared) = shared.upgrade() {
            shared.handle(signal);
        }
    })
}

/// Keeps a monitor running; dropping it stops monitoring on every exit path.
#[must_use = "dropping the handle stops monitoring"]
pub struct MonitorHandle {
    shared: Arc<Shared>,
    generation: u64,
}

impl MonitorHandle {
    /// Stop monitoring now. A no-op if the run was already stopped and restarted.
    pub fn stop(self) {}
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shared.stop(Some(self.generation));
    }
}

impl fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
