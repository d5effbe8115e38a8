use std::time::{Duration, Instant};

/// Paces a loop toward a target rate by sleeping only for whatever is left
/// of each period. Slow iterations are never compensated for.
#[derive(Clone, Debug)]
pub struct RatePacer {
    period: Duration,
}

impl RatePacer {
    /// # Panics
    ///
    /// Panics if `target_fps` is zero.
    pub fn new(target_fps: u32) -> Self {
        assert!(target_fps > 0, "target fps must be positive");
        Self {
            period: Duration::from_secs_f64(1.0 / target_fps as f64),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time still to wait after an iteration that has run for `elapsed`.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.period.saturating_sub(elapsed)
    }

    /// Sleeps out the rest of the period that began at `started`.
    pub fn pace(&self, started: Instant) {
        let wait = self.remaining(started.elapsed());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
    }
}

/// Frames per second implied by one iteration's wall time.
pub fn measured_fps(iteration: Duration) -> Option<f64> {
    let secs = iteration.as_secs_f64();
    (secs > 0.0).then(|| 1.0 / secs)
}
