//! Owned countdowns for interstitials and timed task rounds.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use interview_core::time::{CountdownUrgency, format_clock};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Countdown that fires its completion callback exactly once.
///
/// Each round starts a fresh instance. Dropping the handle cancels the
/// countdown; a cancelled countdown never completes.
#[must_use = "dropping the handle cancels the countdown"]
pub struct CountdownHandle {
    task: JoinHandle<()>,
    remaining_ticks: Arc<AtomicU64>,
    total_ticks: u64,
    tick: Duration,
}

impl CountdownHandle {
    /// Start a countdown with a one-second tick.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start<F>(duration: Duration, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::start_with_tick(duration, DEFAULT_TICK, on_complete)
    }

    /// Start a countdown with a custom tick; partial ticks round up.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn start_with_tick<F>(duration: Duration, tick: Duration, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let tick = if tick.is_zero() { DEFAULT_TICK } else { tick };
        let total_ticks = ticks_for(duration, tick);
        let remaining_ticks = Arc::new(AtomicU64::new(total_ticks));
        let counter = Arc::clone(&remaining_ticks);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            while counter.load(Ordering::SeqCst) > 0 {
                interval.tick().await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }
            on_complete();
        });

        Self {
            task,
            remaining_ticks,
            total_ticks,
            tick,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        let ticks = self.remaining_ticks.load(Ordering::SeqCst);
        self.tick.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.tick
            .saturating_mul(u32::try_from(self.total_ticks).unwrap_or(u32::MAX))
    }

    /// `M:SS` readout of the remaining time.
    #[must_use]
    pub fn readout(&self) -> String {
        format_clock(self.remaining().as_secs())
    }

    #[must_use]
    pub fn urgency(&self) -> CountdownUrgency {
        CountdownUrgency::classify(
            self.remaining_ticks.load(Ordering::SeqCst),
            self.total_ticks,
        )
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel now instead of at drop.
    pub fn cancel(self) {}
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl fmt::Debug for CountdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountdownHandle")
            .field("remaining", &self.remaining())
            .field("total", &self.total())
            .finish()
    }
}

fn ticks_for(duration: Duration, tick: Duration) -> u64 {
    let tick_nanos = tick.as_nanos();
    let ticks = duration.as_nanos().div_ceil(tick_nanos);
    u64::try_from(ticks).unwrap_or(u64::MAX)
}
