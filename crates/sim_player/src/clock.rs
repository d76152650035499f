//! Delta-time computation for ticks.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::DeltaMode;

/// Computes the delta time of each tick.
#[derive(Debug, Clone)]
pub struct TickClock {
    mode: DeltaMode,
    interval: Duration,
    last: Option<Instant>,
}

impl TickClock {
    #[must_use]
    pub fn new(mode: DeltaMode, interval: Duration) -> Self {
        Self {
            mode,
            interval,
            last: None,
        }
    }

    /// Delta for a tick happening now.
    pub fn next_delta(&mut self) -> f64 {
        self.next_delta_at(Instant::now())
    }

    /// Delta for a tick happening at `now`.
    pub fn next_delta_at(&mut self, now: Instant) -> f64 {
        let delta = match self.mode {
            DeltaMode::Nominal => self.interval.as_secs_f64(),
            DeltaMode::Fixed(seconds) => seconds,
            DeltaMode::WallClock => match self.last {
                Some(previous) => now.saturating_duration_since(previous).as_secs_f64(),
                None => self.interval.as_secs_f64(),
            },
        };
        self.last = Some(now);
        delta
    }

    /// Forget the previous tick, so the next wall-clock delta is nominal.
    pub fn restart(&mut self) {
        self.last = None;
    }
}
