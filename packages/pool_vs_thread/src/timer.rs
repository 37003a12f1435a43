use std::time::{Duration, Instant};

/// Monotonic stopwatch around the release-to-completion window of a run.
///
/// The orchestrator starts it immediately before opening the release gate and stops it
/// immediately after the last completion signal, so unit creation and teardown stay outside
/// the measured interval.
#[derive(Clone, Copy, Debug)]
#[must_use = "a stopwatch measures nothing unless it is stopped"]
pub struct Stopwatch {
    started_at: Instant,
}

impl Stopwatch {
    /// Starts measuring from the current instant.
    pub fn start() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// The instant the stopwatch was started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Stops the stopwatch, returning the elapsed time.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Real timing logic in tests is not desirable.
    pub fn stop(self) -> Duration {
        self.started_at.elapsed()
    }
}
