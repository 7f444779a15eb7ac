use interview_core::model::{SessionSnapshot, SnapshotError};
use serde::Deserialize;

/// Body of `GET /interview/{id}/state`.
///
/// The backend omits `status` while a session is active.
#[derive(Debug, Deserialize)]
pub(super) struct StateResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    current_round: Option<String>,
}

impl StateResponse {
    pub(super) fn into_snapshot(self) -> Result<SessionSnapshot, SnapshotError> {
        SessionSnapshot::from_parts(self.status.as_deref(), self.current_round.as_deref())
    }
}
