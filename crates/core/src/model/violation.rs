use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Environment signals the proctoring monitor classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TabHidden,
    WindowBlur,
    FullscreenExit,
    DevtoolsSuspected,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 4] = [
        ViolationKind::TabHidden,
        ViolationKind::WindowBlur,
        ViolationKind::FullscreenExit,
        ViolationKind::DevtoolsSuspected,
    ];

    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::TabHidden | Self::WindowBlur | Self::FullscreenExit => Severity::Hard,
            Self::DevtoolsSuspected => Severity::Soft,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::TabHidden => "tab_hidden",
            Self::WindowBlur => "window_blur",
            Self::FullscreenExit => "fullscreen_exit",
            Self::DevtoolsSuspected => "devtools_suspected",
        }
    }
}

/// Hard violations escalate towards termination; soft ones are diagnostic-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Hard,
    Soft,
}

/// Per-kind violation counters for a single monitored round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationTally {
    pub tab_hidden: u32,
    pub window_blur: u32,
    pub fullscreen_exit: u32,
    pub devtools_suspected: u32,
}

impl ViolationTally {
    #[must_use]
    pub fn count(&self, kind: ViolationKind) -> u32 {
        match kind {
            ViolationKind::TabHidden => self.tab_hidden,
            ViolationKind::WindowBlur => self.window_blur,
            ViolationKind::FullscreenExit => self.fullscreen_exit,
            ViolationKind::DevtoolsSuspected => self.devtools_suspected,
        }
    }

    pub fn record(&mut self, kind: ViolationKind) {
        let slot = match kind {
            ViolationKind::TabHidden => &mut self.tab_hidden,
            ViolationKind::WindowBlur => &mut self.window_blur,
            ViolationKind::FullscreenExit => &mut self.fullscreen_exit,
            ViolationKind::DevtoolsSuspected => &mut self.devtools_suspected,
        };
        *slot = slot.saturating_add(1);
    }

    /// Sum of all hard-violation counters.
    #[must_use]
    pub fn hard_total(&self) -> u32 {
        ViolationKind::ALL
            .iter()
            .filter(|kind| kind.severity() == Severity::Hard)
            .map(|kind| self.count(*kind))
            .fold(0_u32, u32::saturating_add)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One counted violation, kept for the round's proctoring log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub at: DateTime<Utc>,
}

/// User-visible warning derived from the escalation counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Warning {
    Caution,
    Terminated,
}

impl Warning {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Caution => {
                "Warning: Please stay on the interview screen. Switching tabs or apps again will terminate your session."
            }
            Self::Terminated => "Interview Terminated due to repeated violations.",
        }
    }

    /// Termination warnings never auto-clear.
    #[must_use]
    pub fn is_sticky(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_follow_two_tiers() {
        assert_eq!(ViolationKind::TabHidden.severity(), Severity::Hard);
        assert_eq!(ViolationKind::WindowBlur.severity(), Severity::Hard);
        assert_eq!(ViolationKind::FullscreenExit.severity(), Severity::Hard);
        assert_eq!(ViolationKind::DevtoolsSuspected.severity(), Severity::Soft);
    }

    #[test]
    fn tally_counts_per_kind() {
        let mut tally = ViolationTally::default();
        assert!(tally.is_empty());
        tally.record(ViolationKind::TabHidden);
        tally.record(ViolationKind::DevtoolsSuspected);
        tally.record(ViolationKind::DevtoolsSuspected);
        tally.record(ViolationKind::WindowBlur);

        assert_eq!(tally.count(ViolationKind::TabHidden), 1);
        assert_eq!(tally.count(ViolationKind::DevtoolsSuspected), 2);
        assert_eq!(tally.hard_total(), 2);
    }

    #[test]
    fn only_termination_is_sticky() {
        assert!(Warning::Terminated.is_sticky());
        assert!(!Warning::Caution.is_sticky());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ViolationKind::FullscreenExit).unwrap();
        assert_eq!(json, "\"fullscreen_exit\"");
    }
}
