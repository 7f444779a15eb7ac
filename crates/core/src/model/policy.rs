use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

use crate::model::{RoundId, RoundKind, TaskKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("warn threshold must be at least 1")]
    InvalidWarnThreshold,

    #[error("terminate threshold ({terminate_at}) must exceed warn threshold ({warn_at})")]
    InvalidTerminateThreshold { warn_at: u32, terminate_at: u32 },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("devtools threshold must be greater than zero")]
    InvalidDevtoolsThreshold,
}

//
// ─── PROCTORING ────────────────────────────────────────────────────────────────
//

/// Two-strike proctoring configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProctoringPolicy {
    enabled: bool,
    warn_at: u32,
    terminate_at: u32,
    warning_display: Duration,
    devtools_threshold_px: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ProctoringPolicyDraft {
    pub enabled: Option<bool>,
    pub warn_at: Option<u32>,
    pub terminate_at: Option<u32>,
    pub warning_display: Option<Duration>,
    pub devtools_threshold_px: Option<u32>,
}

impl ProctoringPolicyDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft, filling unset fields from the defaults.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError` if thresholds are inconsistent or durations are zero.
    pub fn validate(self) -> Result<ProctoringPolicy, PolicyError> {
        let defaults = ProctoringPolicy::default();
        let warn_at = self.warn_at.unwrap_or(defaults.warn_at);
        let terminate_at = self.terminate_at.unwrap_or(defaults.terminate_at);
        let warning_display = self.warning_display.unwrap_or(defaults.warning_display);
        let devtools_threshold_px = self
            .devtools_threshold_px
            .unwrap_or(defaults.devtools_threshold_px);

        if warn_at == 0 {
            return Err(PolicyError::InvalidWarnThreshold);
        }
        if terminate_at <= warn_at {
            return Err(PolicyError::InvalidTerminateThreshold {
                warn_at,
                terminate_at,
            });
        }
        if warning_display.is_zero() {
            return Err(PolicyError::ZeroDuration {
                field: "warning_display",
            });
        }
        if devtools_threshold_px == 0 {
            return Err(PolicyError::InvalidDevtoolsThreshold);
        }

        Ok(ProctoringPolicy {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            warn_at,
            terminate_at,
            warning_display,
            devtools_threshold_px,
        })
    }
}

impl ProctoringPolicy {
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Escalation count that raises the caution warning.
    #[must_use]
    pub fn warn_at(&self) -> u32 {
        self.warn_at
    }

    /// Escalation count that terminates the round.
    #[must_use]
    pub fn terminate_at(&self) -> u32 {
        self.terminate_at
    }

    #[must_use]
    pub fn warning_display(&self) -> Duration {
        self.warning_display
    }

    /// Outer/inner viewport gap (px) treated as docked inspection tooling.
    #[must_use]
    pub fn devtools_threshold_px(&self) -> u32 {
        self.devtools_threshold_px
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Default for ProctoringPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            warn_at: 1,
            terminate_at: 2,
            warning_display: Duration::from_secs(5),
            devtools_threshold_px: 160,
        }
    }
}

//
// ─── ROUND FLOW ────────────────────────────────────────────────────────────────
//

/// Product-tuned durations for the round flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTimings {
    transition_min: Duration,
    completion_redirect: Duration,
    analysis_delay: Duration,
    prep_default: Duration,
    prep_overrides: HashMap<RoundId, Duration>,
    mcq_limit: Duration,
    coding_limit: Duration,
    retry_delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct FlowTimingsDraft {
    pub transition_min: Option<Duration>,
    pub completion_redirect: Option<Duration>,
    pub analysis_delay: Option<Duration>,
    pub prep_default: Option<Duration>,
    pub prep_overrides: Vec<(RoundId, Duration)>,
    pub mcq_limit: Option<Duration>,
    pub coding_limit: Option<Duration>,
    pub retry_delay: Option<Duration>,
}

impl FlowTimingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft; per-round prep overrides are layered over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::ZeroDuration` for any zero countdown, limit or retry delay.
    /// A zero `transition_min` or `completion_redirect` is allowed.
    pub fn validate(self) -> Result<FlowTimings, PolicyError> {
        let defaults = FlowTimings::default();
        let analysis_delay = non_zero(
            self.analysis_delay.unwrap_or(defaults.analysis_delay),
            "analysis_delay",
        )?;
        let prep_default = non_zero(
            self.prep_default.unwrap_or(defaults.prep_default),
            "prep_default",
        )?;
        let mcq_limit = non_zero(self.mcq_limit.unwrap_or(defaults.mcq_limit), "mcq_limit")?;
        let coding_limit = non_zero(
            self.coding_limit.unwrap_or(defaults.coding_limit),
            "coding_limit",
        )?;
        let retry_delay = non_zero(
            self.retry_delay.unwrap_or(defaults.retry_delay),
            "retry_delay",
        )?;

        let mut prep_overrides = defaults.prep_overrides;
        for (round, duration) in self.prep_overrides {
            prep_overrides.insert(round, non_zero(duration, "prep_overrides")?);
        }

        Ok(FlowTimings {
            transition_min: self.transition_min.unwrap_or(defaults.transition_min),
            completion_redirect: self
                .completion_redirect
                .unwrap_or(defaults.completion_redirect),
            analysis_delay,
            prep_default,
            prep_overrides,
            mcq_limit,
            coding_limit,
            retry_delay,
        })
    }
}

fn non_zero(value: Duration, field: &'static str) -> Result<Duration, PolicyError> {
    if value.is_zero() {
        return Err(PolicyError::ZeroDuration { field });
    }
    Ok(value)
}

impl FlowTimings {
    /// Minimum time a transition stays visible.
    #[must_use]
    pub fn transition_min(&self) -> Duration {
        self.transition_min
    }

    /// Delay between reaching completion and leaving for the results view.
    #[must_use]
    pub fn completion_redirect(&self) -> Duration {
        self.completion_redirect
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    #[must_use]
    pub fn prep_duration(&self, round: &RoundId) -> Duration {
        self.prep_overrides
            .get(round)
            .copied()
            .unwrap_or(self.prep_default)
    }

    /// Countdown for an interstitial, or `None` for task rounds.
    #[must_use]
    pub fn interstitial_duration(&self, kind: RoundKind, round: &RoundId) -> Option<Duration> {
        match kind {
            RoundKind::Analysis => Some(self.analysis_delay),
            RoundKind::Prep => Some(self.prep_duration(round)),
            RoundKind::Task(_) => None,
        }
    }

    /// Time limit for a task round; technical chat rounds are untimed.
    #[must_use]
    pub fn task_limit(&self, task: TaskKind) -> Option<Duration> {
        match task {
            TaskKind::Mcq => Some(self.mcq_limit),
            TaskKind::Coding => Some(self.coding_limit),
            TaskKind::TechnicalChat => None,
        }
    }
}

impl Default for FlowTimings {
    fn default() -> Self {
        let prep_overrides = ["prep_oa", "prep_coding", "prep_tech_1", "prep_tech_2"]
            .into_iter()
            .filter_map(|raw| RoundId::new(raw).ok())
            .map(|round| (round, Duration::from_secs(60)))
            .collect();

        Self {
            transition_min: Duration::from_millis(800),
            completion_redirect: Duration::from_secs(2),
            analysis_delay: Duration::from_secs(5),
            prep_default: Duration::from_secs(5),
            prep_overrides,
            mcq_limit: Duration::from_secs(15 * 60),
            coding_limit: Duration::from_secs(30 * 60),
            retry_delay: Duration::from_secs(2),
        }
    }
}
