//! Proctoring: classify host signals into violations and enforce the
//! two-strike termination policy for one task round.

mod monitor;
mod state;

pub use monitor::{MonitorHandle, ProctoringMonitor, ProctoringSnapshot};
pub use state::{Observation, ProctorState, classify_signal};
