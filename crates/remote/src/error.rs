use interview_core::model::SnapshotError;
use thiserror::Error;

/// Errors surfaced by remote session service adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("session not found")]
    NotFound,

    #[error("session already completed")]
    Conflict,

    #[error("session service returned status {status}")]
    Status { status: u16 },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid session state: {0}")]
    Decode(#[from] SnapshotError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl RemoteError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Http(_) => true,
            Self::Status { status } => *status >= 500,
            Self::NotFound | Self::Conflict | Self::Decode(_) => false,
        }
    }
}
