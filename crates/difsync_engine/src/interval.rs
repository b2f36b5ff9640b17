//! Adaptive polling interval.

use std::time::Duration;

/// Share of the interval range removed after a cycle with local edits.
const CLIENT_CHANGE_CUT: f64 = 0.4;
/// Share of the interval range removed after a cycle with remote edits.
const SERVER_CHANGE_CUT: f64 = 0.2;
/// Share of the interval range added after a quiet cycle.
const IDLE_CREEP: f64 = 0.1;

/// Tracks the pause between sync cycles.
///
/// Activity on either side shortens the pause and quiet cycles lengthen
/// it, always within `[min, max]`. Millisecond resolution.
#[derive(Debug, Clone)]
pub struct IntervalController {
    min_ms: u64,
    max_ms: u64,
    current_ms: u64,
}

impl IntervalController {
    /// Creates a controller starting at `initial`.
    ///
    /// `initial` is not clamped until the first adjustment, so a host may
    /// start with a short first pause.
    pub fn new(min: Duration, max: Duration, initial: Duration) -> Self {
        Self {
            min_ms: duration_ms(min),
            max_ms: duration_ms(max).max(duration_ms(min)),
            current_ms: duration_ms(initial),
        }
    }

    /// The pause before the next cycle.
    pub fn current(&self) -> Duration {
        Duration::from_millis(self.current_ms)
    }

    /// Applies the outcome of a cycle and returns the new pause.
    ///
    /// Both cuts apply when both sides changed.
    pub fn adjust(&mut self, client_changed: bool, server_changed: bool) -> Duration {
        let range = (self.max_ms - self.min_ms) as f64;
        let mut next = self.current_ms as f64;
        if client_changed {
            next -= CLIENT_CHANGE_CUT * range;
        }
        if server_changed {
            next -= SERVER_CHANGE_CUT * range;
        }
        if !client_changed && !server_changed {
            next += IDLE_CREEP * range;
        }
        let next = next.round().clamp(self.min_ms as f64, self.max_ms as f64);
        self.current_ms = next as u64;
        self.current()
    }

    /// Drops the pause to zero so that the next adjustment lands on the
    /// minimum. Used when a document lost sync and must recover quickly.
    pub fn request_resync(&mut self) {
        self.current_ms = 0;
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
