#![forbid(unsafe_code)]

pub mod env;
pub mod error;
pub mod interview;
pub mod proctoring;
pub mod timer;

pub use interview_core::Clock;

pub use env::{Capabilities, EnvSignal, Environment, FakeEnvironment, Headless, SignalKind};
pub use error::{CapabilityError, ControllerError, DriverError};
pub use interview::{
    ControllerPhase, DriverReport, ForceReason, RoundContext, RoundController, RoundPresenter,
    RoundTicket, RoundView, SessionDriver, SubmissionGuard, SubmissionState, TransitionOutcome,
};
pub use proctoring::{MonitorHandle, ProctoringMonitor, ProctoringSnapshot};
pub use timer::CountdownHandle;
