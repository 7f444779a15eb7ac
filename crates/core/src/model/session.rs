use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{RoundError, RoundId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("active session has no current round")]
    MissingRound,

    #[error("unknown session status: {0}")]
    UnknownStatus(String),

    #[error(transparent)]
    Round(#[from] RoundError),
}

/// Overall session status as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    /// Parse the wire representation.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::UnknownStatus` for anything but `active`/`completed`.
    pub fn parse(raw: &str) -> Result<Self, SnapshotError> {
        match raw.trim() {
            "active" | "in_progress" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(SnapshotError::UnknownStatus(other.to_owned())),
        }
    }
}

/// Client-side read-through copy of the remote session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSnapshot {
    Active { current_round: RoundId },
    Completed,
}

impl SessionSnapshot {
    #[must_use]
    pub fn active(current_round: RoundId) -> Self {
        Self::Active { current_round }
    }

    /// Build a snapshot from the loosely-typed fields the service returns.
    ///
    /// A missing status with a present round means the session is active, and a
    /// `completed` round pointer means the session is over.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` when an active session has no usable round.
    pub fn from_parts(
        status: Option<&str>,
        current_round: Option<&str>,
    ) -> Result<Self, SnapshotError> {
        let status = status.map(SessionStatus::parse).transpose()?;
        if status == Some(SessionStatus::Completed) || current_round == Some("completed") {
            return Ok(Self::Completed);
        }
        let round = current_round.ok_or(SnapshotError::MissingRound)?;
        Ok(Self::active(RoundId::new(round)?))
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match self {
            Self::Active { .. } => SessionStatus::Active,
            Self::Completed => SessionStatus::Completed,
        }
    }

    #[must_use]
    pub fn current_round(&self) -> Option<&RoundId> {
        match self {
            Self::Active { current_round } => Some(current_round),
            Self::Completed => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}
