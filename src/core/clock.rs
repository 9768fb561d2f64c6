/// Minimal frame clock - turns platform timestamps into delta time
///
/// Timestamps are seconds from a monotonic source that starts at zero,
/// so the very first delta is the time spent before the first frame.
/// Timestamps stay `f64` so long sessions keep sub-millisecond steps;
/// only the delta is narrowed to `f32`.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    last_tick: f64,
    max_delta: Option<f32>,
}

impl Clock {
    /// Clock with deltas capped at `max_delta` seconds, `None` for no cap
    pub fn new(max_delta: Option<f32>) -> Self {
        Self {
            last_tick: 0.0,
            max_delta,
        }
    }

    /// Get delta time since last tick and advance clock
    /// Returns delta in seconds, never negative
    pub fn tick(&mut self, now: f64) -> f32 {
        let raw = (now - self.last_tick).max(0.0) as f32;
        self.last_tick = now;

        match self.max_delta {
            Some(max) if raw > max => {
                log::debug!("Frame delta {:.3}s clamped to {:.3}s", raw, max);
                max
            }
            _ => raw,
        }
    }

    /// Restart delta measurement from `now`
    pub fn reset(&mut self, now: f64) {
        self.last_tick = now;
    }

    pub fn last_tick(&self) -> f64 {
        self.last_tick
    }

    pub fn max_delta(&self) -> Option<f32> {
        self.max_delta
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(None)
    }
}
