use std::hint::black_box;

/// A unit of work that an execution unit performs after the release gate opens.
///
/// Both execution models invoke the same `Work` instance for every task of a run, so the only
/// difference between them is how tasks are mapped onto threads.
pub trait Work: Send + Sync + 'static {
    /// Performs one task's worth of work on the calling thread.
    fn execute(&self);
}

/// Synthetic CPU-bound workload with a configurable iteration count.
///
/// Each iteration performs a fixed amount of floating point arithmetic on a single accumulator,
/// so the execution time grows linearly with the iteration count and nothing is allocated.
///
/// # Examples
///
/// ```
/// use pool_vs_thread::{Work, Workload};
///
/// let workload = Workload::new(10_000);
/// workload.execute();
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Workload {
    iterations: u64,
}

impl Workload {
    /// Creates a workload that performs `iterations` rounds of arithmetic per task.
    #[must_use]
    pub const fn new(iterations: u64) -> Self {
        Self { iterations }
    }

    /// The number of iterations performed by every task.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl Work for Workload {
    #[cfg_attr(test, mutants::skip)] // Removing the diagnostic is not observable by tests.
    fn execute(&self) {
        let accumulated = accumulate(self.iterations);

        if !accumulated.is_finite() {
            tracing::warn!(
                iterations = self.iterations,
                accumulated,
                "workload accumulated a non-finite value"
            );
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "the arithmetic only needs to be non-eliminable, not exact"
)]
fn accumulate(iterations: u64) -> f64 {
    let mut x = 0.0_f64;

    for i in 1..=iterations {
        // The tan() argument is in 1..=10, well away from its poles.
        let step = (i % 10) as f64 + 1.0;

        x += (i as f64).sin() * step.tan();
        x = black_box(x);
    }

    black_box(x)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn zero_iterations_is_finite_zero() {
        let accumulated = accumulate(0);

        assert!(accumulated.is_finite());
        assert!(accumulated.abs() < f64::EPSILON);
    }

    #[test]
    fn accumulation_is_deterministic() {
        let first = accumulate(5_000);
        let second = accumulate(5_000);

        assert!((first - second).abs() < f64::EPSILON);
        assert!(first.is_finite());
    }

    #[test]
    fn accumulation_stays_finite_for_large_counts() {
        assert!(accumulate(1_000_000).is_finite());
    }

    #[test]
    fn iterations_are_reported() {
        assert_eq!(Workload::new(1234).iterations(), 1234);
    }

    #[cfg_attr(miri, ignore)] // Too slow under Miri.
    #[test]
    fn larger_workload_takes_longer() {
        let small = Workload::new(1_000);
        let large = Workload::new(2_000_000);

        let started = Instant::now();
        small.execute();
        let small_elapsed = started.elapsed();

        let started = Instant::now();
        large.execute();
        let large_elapsed = started.elapsed();

        assert!(large_elapsed > small_elapsed);
    }
}
