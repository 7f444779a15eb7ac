use std::time::Duration;

use interview_core::model::{FlowTimings, RoundId, RoundKind, TaskKind, prep_message};

/// What the presentation layer should show for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundView {
    /// Server-side resume analysis; advanced after `delay`.
    ResumeAnalysis { round: RoundId, delay: Duration },
    Prep {
        round: RoundId,
        message: &'static str,
        duration: Duration,
    },
    Task {
        round: RoundId,
        task: TaskKind,
        time_limit: Option<Duration>,
    },
    /// Round id the client does not recognise; shown as an error, never guessed.
    Unknown { round: RoundId },
}

impl RoundView {
    #[must_use]
    pub fn for_round(round: &RoundId, timings: &FlowTimings) -> Self {
        let round = round.clone();
        match RoundKind::classify(&round) {
            Ok(kind @ RoundKind::Analysis) => Self::ResumeAnalysis {
                delay: timings
                    .interstitial_duration(kind, &round)
                    .unwrap_or_default(),
                round,
            },
            Ok(RoundKind::Prep) => Self::Prep {
                message: prep_message(&round),
                duration: timings.prep_duration(&round),
                round,
            },
            Ok(RoundKind::Task(task)) => Self::Task {
                time_limit: timings.task_limit(task),
                round,
                task,
            },
            Err(_) => Self::Unknown { round },
        }
    }

    #[must_use]
    pub fn round(&self) -> &RoundId {
        match self {
            Self::ResumeAnalysis { round, .. }
            | Self::Prep { round, .. }
            | Self::Task { round, .. }
            | Self::Unknown { round } => round,
        }
    }

    /// Countdown that advances an interstitial, if this is one.
    #[must_use]
    pub fn interstitial_countdown(&self) -> Option<Duration> {
        match self {
            Self::ResumeAnalysis { delay, .. } => Some(*delay),
            Self::Prep { duration, .. } => Some(*duration),
            Self::Task { .. } | Self::Unknown { .. } => None,
        }
    }

    #[must_use]
    pub fn task(&self) -> Option<TaskKind> {
        match self {
            Self::Task { task, .. } => Some(*task),
            _ => None,
        }
    }

    /// Short name of the component that renders this view.
    #[must_use]
    pub fn component(&self) -> &'static str {
        match self {
            Self::ResumeAnalysis { .. } => "resume-analysis",
            Self::Prep { .. } => "prep-timer",
            Self::Task { task, .. } => task.label(),
            Self::Unknown { .. } => "unknown",
        }
    }
}
