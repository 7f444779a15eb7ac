use chrono::{DateTime, Utc};
use tokio::time::Instant;

use interview_core::model::{
    ProctoringPolicy, Severity, ViolationKind, ViolationRecord, ViolationTally, Warning,
};

use crate::env::EnvSignal;

/// Result of feeding one violation into [`ProctorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Already terminated; nothing changed.
    Ignored,
    /// Counted without raising a warning (soft violations).
    Recorded,
    Cautioned,
    Terminated,
}

#[derive(Debug, Clone, Copy)]
struct RaisedWarning {
    warning: Warning,
    raised_at: Instant,
}

/// Escalation bookkeeping for one monitored round.
#[derive(Debug, Clone, Default)]
pub struct ProctorState {
    escalation: u32,
    tally: ViolationTally,
    log: Vec<ViolationRecord>,
    warning: Option<RaisedWarning>,
    terminated: bool,
}

/// Map a raw environment signal to the violation it represents, if any.
#[must_use]
pub fn classify_signal(signal: EnvSignal, policy: &ProctoringPolicy) -> Option<ViolationKind> {
    match signal {
        EnvSignal::VisibilityChanged { hidden: true } => Some(ViolationKind::TabHidden),
        EnvSignal::WindowBlurred => Some(ViolationKind::WindowBlur),
        EnvSignal::FullscreenChanged { active: false } => Some(ViolationKind::FullscreenExit),
        EnvSignal::Resized(viewport)
            if viewport.chrome_gap() > policy.devtools_threshold_px() =>
        {
            Some(ViolationKind::DevtoolsSuspected)
        }
        _ => None,
    }
}

impl ProctorState {
    /// Count a violation and apply the escalation policy.
    pub fn observe(
        &mut self,
        kind: ViolationKind,
        policy: &ProctoringPolicy,
        now: Instant,
        at: DateTime<Utc>,
    ) -> Observation {
        if self.terminated {
            return Observation::Ignored;
        }

        let severity = kind.severity();
        self.tally.record(kind);
        self.log.push(ViolationRecord { kind, severity, at });

        if severity == Severity::Soft {
            return Observation::Recorded;
        }

        self.escalation = self.escalation.saturating_add(1);
        if self.escalation >= policy.terminate_at() {
            self.terminated = true;
            self.raise(Warning::Terminated, now);
            Observation::Terminated
        } else if self.escalation >= policy.warn_at() {
            self.raise(Warning::Caution, now);
            Observation::Cautioned
        } else {
            Observation::Recorded
        }
    }

    fn raise(&mut self, warning: Warning, now: Instant) {
        self.warning = Some(RaisedWarning {
            warning,
            raised_at: now,
        });
    }

    /// Warning visible at `now`; cautions expire after the display duration.
    #[must_use]
    pub fn warning(&self, policy: &ProctoringPolicy, now: Instant) -> Option<Warning> {
        let raised = self.warning?;
        if raised.warning.is_sticky() {
            return Some(raised.warning);
        }
        let shown_for = now.saturating_duration_since(raised.raised_at);
        (shown_for < policy.warning_display()).then_some(raised.warning)
    }

    #[must_use]
    pub fn escalation(&self) -> u32 {
        self.escalation
    }

    #[must_use]
    pub fn tally(&self) -> ViolationTally {
        self.tally
    }

    #[must_use]
    pub fn log(&self) -> &[ViolationRecord] {
        &self.log
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Viewport;
    use interview_core::time::fixed_now;
    use std::time::Duration;

    fn observe(state: &mut ProctorState, kind: ViolationKind, now: Instant) -> Observation {
        state.observe(kind, &ProctoringPolicy::default(), now, fixed_now())
    }

    #[test]
    fn escalation_counts_hard_violations_only() {
        let now = Instant::now();
        let mut state = ProctorState::default();

        assert_eq!(
            observe(&mut state, ViolationKind::DevtoolsSuspected, now),
            Observation::Recorded
        );
        assert_eq!(
            observe(&mut state, ViolationKind::DevtoolsSuspected, now),
            Observation::Recorded
        );
        assert_eq!(state.escalation(), 0);
        assert_eq!(state.warning(&ProctoringPolicy::default(), now), None);

        assert_eq!(
            observe(&mut state, ViolationKind::WindowBlur, now),
            Observation::Cautioned
        );
        assert_eq!(state.escalation(), 1);
        assert!(!state.is_terminated());

        assert_eq!(
            observe(&mut state, ViolationKind::FullscreenExit, now),
            Observation::Terminated
        );
        assert_eq!(state.escalation(), 2);
        assert!(state.is_terminated());
        assert_eq!(state.log().len(), 4);
    }

    #[test]
    fn terminated_state_is_frozen() {
        let now = Instant::now();
        let mut state = ProctorState::default();
        observe(&mut state, ViolationKind::TabHidden, now);
        observe(&mut state, ViolationKind::TabHidden, now);
        let tally = state.tally();

        assert_eq!(
            observe(&mut state, ViolationKind::TabHidden, now),
            Observation::Ignored
        );
        assert_eq!(
            observe(&mut state, ViolationKind::DevtoolsSuspected, now),
            Observation::Ignored
        );
        assert_eq!(state.escalation(), 2);
        assert_eq!(state.tally(), tally);
        assert_eq!(state.log().len(), 2);
    }

    #[test]
    fn caution_expires_termination_sticks() {
        let policy = ProctoringPolicy::default();
        let start = Instant::now();
        let mut state = ProctorState::default();
        observe(&mut state, ViolationKind::TabHidden, start);

        let almost = start + policy.warning_display() - Duration::from_millis(1);
        assert_eq!(state.warning(&policy, almost), Some(Warning::Caution));
        assert_eq!(
            state.warning(&policy, start + policy.warning_display()),
            None
        );

        observe(&mut state, ViolationKind::TabHidden, start);
        let much_later = start + Duration::from_secs(3600);
        assert_eq!(state.warning(&policy, much_later), Some(Warning::Terminated));
    }

    #[test]
    fn classifies_signals() {
        let policy = ProctoringPolicy::default();
        assert_eq!(
            classify_signal(EnvSignal::VisibilityChanged { hidden: true }, &policy),
            Some(ViolationKind::TabHidden)
        );
        assert_eq!(
            classify_signal(EnvSignal::VisibilityChanged { hidden: false }, &policy),
            None
        );
        assert_eq!(
            classify_signal(EnvSignal::FullscreenChanged { active: true }, &policy),
            None
        );
        assert_eq!(
            classify_signal(EnvSignal::FullscreenChanged { active: false }, &policy),
            Some(ViolationKind::FullscreenExit)
        );

        let docked = Viewport {
            outer_width: 1600,
            inner_width: 1200,
            outer_height: 900,
            inner_height: 880,
        };
        assert_eq!(
            classify_signal(EnvSignal::Resized(docked), &policy),
            Some(ViolationKind::DevtoolsSuspected)
        );
        let at_threshold = Viewport {
            outer_width: 1360,
            inner_width: 1200,
            ..docked
        };
        assert_eq!(classify_signal(EnvSignal::Resized(at_threshold), &policy), None);
    }
}
