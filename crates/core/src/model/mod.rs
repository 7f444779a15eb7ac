mod ids;
mod policy;
mod round;
mod session;
mod violation;

pub use ids::{ParseIdError, SessionId};
pub use policy::{
    FlowTimings, FlowTimingsDraft, PolicyError, ProctoringPolicy, ProctoringPolicyDraft,
};
pub use round::{RoundError, RoundId, RoundKind, TaskKind, prep_message};
pub use session::{SessionSnapshot, SessionStatus, SnapshotError};
pub use violation::{Severity, ViolationKind, ViolationRecord, ViolationTally, Warning};
