//! Host capabilities the interview core depends on.
//!
//! Browser globals (document visibility, fullscreen state, speech engines) are
//! injected through these traits so the state machines run the same against a
//! real host, a headless runner, or a test fake.

use std::fmt;
use std::sync::Arc;

use crate::error::CapabilityError;

mod fake;

pub use fake::FakeEnvironment;

/// Signal sources a monitor can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Visibility,
    Blur,
    Fullscreen,
    Resize,
}

impl SignalKind {
    pub const ALL: [SignalKind; 4] = [
        SignalKind::Visibility,
        SignalKind::Blur,
        SignalKind::Fullscreen,
        SignalKind::Resize,
    ];
}

/// Outer window and inner viewport sizes in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub outer_width: u32,
    pub inner_width: u32,
    pub outer_height: u32,
    pub inner_height: u32,
}

impl Viewport {
    /// Largest outer/inner gap across both axes.
    #[must_use]
    pub fn chrome_gap(&self) -> u32 {
        let width = self.outer_width.saturating_sub(self.inner_width);
        let height = self.outer_height.saturating_sub(self.inner_height);
        width.max(height)
    }
}

/// An environment event delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSignal {
    VisibilityChanged { hidden: bool },
    WindowBlurred,
    FullscreenChanged { active: bool },
    Resized(Viewport),
}

impl EnvSignal {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::VisibilityChanged { .. } => SignalKind::Visibility,
            Self::WindowBlurred => SignalKind::Blur,
            Self::FullscreenChanged { .. } => SignalKind::Fullscreen,
            Self::Resized(_) => SignalKind::Resize,
        }
    }
}

pub type Listener = Arc<dyn Fn(EnvSignal) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Event-listener registry of the host.
pub trait Environment: Send + Sync {
    /// Attach a listener. Returns `None` when the host cannot deliver `kind`,
    /// in which case the corresponding detector stays silent.
    fn add_listener(&self, kind: SignalKind, listener: Listener) -> Option<ListenerId>;

    fn remove_listener(&self, id: ListenerId);
}

/// Fullscreen and scroll control of the host.
pub trait PresentationMode: Send + Sync {
    /// # Errors
    ///
    /// Returns `CapabilityError` if the host refuses or lacks fullscreen.
    fn request_fullscreen(&self) -> Result<(), CapabilityError>;

    fn is_fullscreen(&self) -> bool;

    fn set_scroll_locked(&self, locked: bool);
}

pub trait SpeechOutput: Send + Sync {
    /// # Errors
    ///
    /// Returns `CapabilityError::Unsupported` when no speech synthesis is available.
    fn speak(&self, text: &str) -> Result<(), CapabilityError>;

    /// Stop any utterance in progress.
    fn cancel(&self);
}

pub trait SpeechInput: Send + Sync {
    /// # Errors
    ///
    /// Returns `CapabilityError::Unsupported` when no recognizer is available.
    fn start(&self) -> Result<(), CapabilityError>;

    /// Force-stop recognition, discarding pending results.
    fn abort(&self);
}

/// Host without any capabilities: detectors never fire, speech is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl Environment for Headless {
    fn add_listener(&self, _kind: SignalKind, _listener: Listener) -> Option<ListenerId> {
        None
    }

    fn remove_listener(&self, _id: ListenerId) {}
}

impl PresentationMode for Headless {
    fn request_fullscreen(&self) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported("fullscreen"))
    }

    fn is_fullscreen(&self) -> bool {
        false
    }

    fn set_scroll_locked(&self, _locked: bool) {}
}

impl SpeechOutput for Headless {
    fn speak(&self, _text: &str) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported("speech synthesis"))
    }

    fn cancel(&self) {}
}

impl SpeechInput for Headless {
    fn start(&self) -> Result<(), CapabilityError> {
        Err(CapabilityError::Unsupported("speech recognition"))
    }

    fn abort(&self) {}
}

/// Aggregates host capabilities behind trait objects for easy host swapping.
#[derive(Clone)]
pub struct Capabilities {
    pub environment: Arc<dyn Environment>,
    pub presentation: Arc<dyn PresentationMode>,
    pub speech_output: Arc<dyn SpeechOutput>,
    pub speech_input: Arc<dyn SpeechInput>,
}

impl Capabilities {
    #[must_use]
    pub fn headless() -> Self {
        Self::from_host(Headless)
    }

    /// Use one value for every capability.
    #[must_use]
    pub fn from_host<H>(host: H) -> Self
    where
        H: Environment + PresentationMode + SpeechOutput + SpeechInput + Clone + 'static,
    {
        Self {
            environment: Arc::new(host.clone()),
            presentation: Arc::new(host.clone()),
            speech_output: Arc::new(host.clone()),
            speech_input: Arc::new(host),
        }
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
