//! Round flow: what to show for the current round and when to move on.

mod controller;
mod driver;
mod submission;
mod view;

pub use controller::{ControllerPhase, RoundController, RoundTicket, TransitionOutcome};
pub use driver::{DriverReport, ForceReason, RoundContext, RoundPresenter, SessionDriver};
pub use submission::{SubmissionGuard, SubmissionState};
pub use view::RoundView;
