use std::num::NonZero;
use std::time::Duration;

use crate::ExecutionModel;

/// The outcome of one timed run of `num_tasks` tasks under one execution model.
///
/// Created once by the orchestrator when a run completes and handed over to a
/// [`ResultSink`][crate::ResultSink] by value. There is no way to modify a record after creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BenchmarkRun {
    model: ExecutionModel,
    num_tasks: NonZero<usize>,
    iterations_per_task: u64,
    elapsed: Duration,
}

impl BenchmarkRun {
    /// Creates the record of a completed run.
    #[must_use]
    pub fn new(
        model: ExecutionModel,
        num_tasks: NonZero<usize>,
        iterations_per_task: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            model,
            num_tasks,
            iterations_per_task,
            elapsed,
        }
    }

    /// The execution model the run was executed under.
    #[must_use]
    pub fn model(&self) -> ExecutionModel {
        self.model
    }

    /// The pool size column of the result file: the pool size for pooled runs, `-1` otherwise.
    #[must_use]
    pub fn pool_size_column(&self) -> i64 {
        self.model.pool_size().map_or(-1, |pool_size| {
            i64::try_from(pool_size.get())
                .expect("a pool of more than i64::MAX threads cannot have been spawned")
        })
    }

    /// How many tasks the run executed.
    #[must_use]
    pub fn num_tasks(&self) -> NonZero<usize> {
        self.num_tasks
    }

    /// How many workload iterations every task performed.
    #[must_use]
    pub fn iterations_per_task(&self) -> u64 {
        self.iterations_per_task
    }

    /// Time from release of the gate until the last task signaled completion.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The elapsed time in whole milliseconds, truncated.
    #[must_use]
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}
