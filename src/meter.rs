//! Interval measurement between observed send or receive events.

use std::time::{Duration, Instant};

/// Elapsed time from `from` to `to` in fractional milliseconds.
///
/// Saturates at zero if `to` is earlier than `from`.
pub fn interval_ms(from: Instant, to: Instant) -> f64 {
    to.saturating_duration_since(from).as_secs_f64() * 1000.0
}

pub fn duration_from_ms(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

/// Remembers the last event and yields the gap to the next one.
#[derive(Debug, Default, Clone)]
pub struct IntervalMeter {
    last: Option<Instant>,
}

impl IntervalMeter {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Record an event at `now`; `None` for the very first event.
    pub fn mark(&mut self, now: Instant) -> Option<f64> {
        let sample = self.last.map(|last| interval_ms(last, now));
        self.last = Some(now);
        sample
    }

    pub fn last(&self) -> Option<Instant> {
        self.last
    }
}
