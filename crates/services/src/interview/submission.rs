use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Open,
    InFlight,
    Submitted,
}

/// Ensures a round is submitted at most once, whether by the candidate or on
/// their behalf. The backend advances on every accepted submission.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubmissionLatch(Arc<Mutex<SubmissionState>>);

impl SubmissionLatch {
    /// Claim the round's submission. `None` while another one is in flight or
    /// after one succeeded.
    pub(crate) fn try_begin(&self) -> Option<SubmissionGuard> {
        let mut state = self.lock();
        if *state != SubmissionState::Open {
            return None;
        }
        *state = SubmissionState::InFlight;
        Some(SubmissionGuard {
            latch: self.clone(),
            accepted: false,
        })
    }

    pub(crate) fn state(&self) -> SubmissionState {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, SubmissionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive right to submit the current round.
///
/// Call [`SubmissionGuard::accepted`] once the service took the submission;
/// dropping the guard otherwise reopens the round for another attempt.
#[must_use = "dropping the guard reopens the submission"]
#[derive(Debug)]
pub struct SubmissionGuard {
    latch: SubmissionLatch,
    accepted: bool,
}

impl SubmissionGuard {
    pub fn accepted(mut self) {
        self.accepted = true;
        *self.latch.lock() = SubmissionState::Submitted;
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        if !self.accepted {
            *self.latch.lock() = SubmissionState::Open;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_submission_at_a_time() {
        let latch = SubmissionLatch::default();
        let guard = latch.try_begin().unwrap();
        assert_eq!(latch.state(), SubmissionState::InFlight);
        assert!(latch.try_begin().is_none());

        guard.accepted();
        assert_eq!(latch.state(), SubmissionState::Submitted);
        assert!(latch.try_begin().is_none());
    }

    #[test]
    fn failed_submission_reopens() {
        let latch = SubmissionLatch::default();
        drop(latch.try_begin().unwrap());
        assert_eq!(latch.state(), SubmissionState::Open);
        assert!(latch.try_begin().is_some());
    }
}
