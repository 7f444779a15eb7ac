use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{
    EnvSignal, Environment, Listener, ListenerId, PresentationMode, SignalKind, SpeechInput,
    SpeechOutput,
};
use crate::error::CapabilityError;

#[derive(Default)]
struct FakeState {
    next_id: u64,
    listeners: Vec<(ListenerId, SignalKind, Listener)>,
    unsupported: HashSet<SignalKind>,
    deny_fullscreen: bool,
    fullscreen: bool,
    fullscreen_requests: usize,
    scroll_locked: bool,
    spoken: Vec<String>,
    speech_cancels: usize,
    listening: bool,
    listen_aborts: usize,
}

/// Scriptable in-memory host for tests and demos.
///
/// Signals are delivered synchronously by [`FakeEnvironment::emit`], outside
/// the internal lock, so listeners may detach themselves while handling one.
#[derive(Clone, Default)]
pub struct FakeEnvironment {
    state: Arc<Mutex<FakeState>>,
}

impl FakeEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the host lacks the given signal source.
    #[must_use]
    pub fn without_signal(self, kind: SignalKind) -> Self {
        self.lock().unsupported.insert(kind);
        self
    }

    /// Refuse programmatic fullscreen requests.
    #[must_use]
    pub fn deny_fullscreen(self) -> Self {
        self.lock().deny_fullscreen = true;
        self
    }

    /// Deliver a signal to every listener attached for its kind.
    pub fn emit(&self, signal: EnvSignal) {
        let targets: Vec<Listener> = {
            let mut state = self.lock();
            if let EnvSignal::FullscreenChanged { active } = signal {
                state.fullscreen = active;
            }
            state
                .listeners
                .iter()
                .filter(|(_, kind, _)| *kind == signal.kind())
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in targets {
            listener(signal);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    #[must_use]
    pub fn fullscreen_requests(&self) -> usize {
        self.lock().fullscreen_requests
    }

    #[must_use]
    pub fn scroll_locked(&self) -> bool {
        self.lock().scroll_locked
    }

    #[must_use]
    pub fn spoken(&self) -> Vec<String> {
        self.lock().spoken.clone()
    }

    #[must_use]
    pub fn speech_cancels(&self) -> usize {
        self.lock().speech_cancels
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    #[must_use]
    pub fn listen_aborts(&self) -> usize {
        self.lock().listen_aborts
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Environment for FakeEnvironment {
    fn add_listener(&self, kind: SignalKind, listener: Listener) -> Option<ListenerId> {
        let mut state = self.lock();
        if state.unsupported.contains(&kind) {
            return None;
        }
        state.next_id += 1;
        let id = ListenerId::new(state.next_id);
        state.listeners.push((id, kind, listener));
        Some(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.lock().listeners.retain(|(registered, _, _)| *registered != id);
    }
}

impl PresentationMode for FakeEnvironment {
    fn request_fullscreen(&self) -> Result<(), CapabilityError> {
        let mut state = self.lock();
        state.fullscreen_requests += 1;
        if state.deny_fullscreen {
            return Err(CapabilityError::Denied("fullscreen"));
        }
        state.fullscreen = true;
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.lock().fullscreen
    }

    fn set_scroll_locked(&self, locked: bool) {
        self.lock().scroll_locked = locked;
    }
}

impl SpeechOutput for FakeEnvironment {
    fn speak(&self, text: &str) -> Result<(), CapabilityError> {
        self.lock().spoken.push(text.to_owned());
        Ok(())
    }

    fn cancel(&self) {
        self.lock().speech_cancels += 1;
    }
}

impl SpeechInput for FakeEnvironment {
    fn start(&self) -> Result<(), CapabilityError> {
        self.lock().listening = true;
        Ok(())
    }

    fn abort(&self) {
        let mut state = self.lock();
        state.listening = false;
        state.listen_aborts += 1;
    }
}
