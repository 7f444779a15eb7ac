use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic timestamps in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

//
// ─── COUNTDOWN READOUT ─────────────────────────────────────────────────────────
//

/// Formats remaining seconds as `M:SS`.
#[must_use]
pub fn format_clock(remaining_secs: u64) -> String {
    format!("{}:{:02}", remaining_secs / 60, remaining_secs % 60)
}

/// Colour band of a countdown readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownUrgency {
    Normal,
    /// 20% or less remaining.
    Warning,
    /// 5% or less remaining.
    Critical,
}

impl CountdownUrgency {
    #[must_use]
    pub fn classify(remaining_secs: u64, total_secs: u64) -> Self {
        if total_secs == 0 {
            return Self::Critical;
        }
        // Integer form of `remaining / total <= pct / 100`.
        let scaled = u128::from(remaining_secs) * 100;
        let total = u128::from(total_secs);
        if scaled <= total * 5 {
            Self::Critical
        } else if scaled <= total * 20 {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(30));
    }

    #[test]
    fn default_clock_ignores_advance() {
        let mut clock = Clock::default_clock();
        clock.advance(Duration::seconds(30));
        assert!(matches!(clock, Clock::Default));
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(9), "0:09");
        assert_eq!(format_clock(60), "1:00");
        assert_eq!(format_clock(15 * 60), "15:00");
        assert_eq!(format_clock(125), "2:05");
    }

    #[test]
    fn urgency_bands() {
        assert_eq!(CountdownUrgency::classify(100, 100), CountdownUrgency::Normal);
        assert_eq!(CountdownUrgency::classify(21, 100), CountdownUrgency::Normal);
        assert_eq!(CountdownUrgency::classify(20, 100), CountdownUrgency::Warning);
        assert_eq!(CountdownUrgency::classify(6, 100), CountdownUrgency::Warning);
        assert_eq!(CountdownUrgency::classify(5, 100), CountdownUrgency::Critical);
        assert_eq!(CountdownUrgency::classify(0, 0), CountdownUrgency::Critical);
    }
}
