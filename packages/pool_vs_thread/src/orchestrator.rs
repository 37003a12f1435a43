use std::num::NonZero;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::{
    BenchmarkRun, ExecutionModel, ResultSink, Stopwatch, SweepConfig, SweepError, Work, Workload,
};

/// Phases a single run passes through, in order.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum RunPhase {
    /// Execution units and barrier exist; every unit is on its way to the release gate.
    Built,

    /// Waiting for the settle delay so that units can reach the release gate.
    Settling,

    /// The gate has been opened and the stopwatch started.
    Released,

    /// Waiting for the last completion signal.
    Draining,

    /// The run's record has been handed to the result sink.
    Recorded,
}

/// Drives the warm-up and the full sweep of runs, strictly one run at a time.
///
/// For every task count and every repetition, the pooled model is run first and the
/// per-task model second, each producing one [`BenchmarkRun`], followed by a cooldown delay.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use pool_vs_thread::{Orchestrator, PacingConfig, ResultLog, SweepConfig, WarmupConfig};
///
/// let config = SweepConfig::new(1000, nz!(2), "4".parse().unwrap())
///     .with_repetitions(nz!(1))
///     .with_warmup(WarmupConfig::disabled())
///     .with_pacing(PacingConfig::none());
///
/// let mut log = ResultLog::new();
/// Orchestrator::new(config).run(&mut log).unwrap();
///
/// assert_eq!(log.runs().len(), 2);
/// ```
#[derive(Debug)]
pub struct Orchestrator {
    config: SweepConfig,
}

impl Orchestrator {
    /// Creates an orchestrator for the given sweep.
    #[must_use]
    pub fn new(config: SweepConfig) -> Self {
        Self { config }
    }

    /// The configuration of the sweep.
    #[must_use]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Executes the warm-up and then every run of the sweep, recording each completed run in
    /// `sink` as soon as it finishes.
    ///
    /// Returns the number of runs recorded.
    ///
    /// # Errors
    ///
    /// Aborts on the first error, without retrying. Runs recorded before the error remain in
    /// the sink.
    pub fn run<S>(&self, sink: &mut S) -> Result<usize, SweepError>
    where
        S: ResultSink + ?Sized,
    {
        self.warm_up();

        let work = Arc::new(Workload::new(self.config.iterations_per_task()));
        let repetitions = self.config.repetitions();
        let mut recorded = 0_usize;

        for num_tasks in self.config.task_counts().iter() {
            for repetition in 1..=repetitions.get() {
                let models = [
                    ExecutionModel::Pooled {
                        pool_size: self.config.pool_size(),
                    },
                    ExecutionModel::PerTask,
                ];

                for model in models {
                    println!("{}", start_line(model, num_tasks, repetition, repetitions));

                    let run = self.execute_run(model, num_tasks, &work)?;

                    println!("{}", finish_line(&run));

                    sink.record(run)?;
                    recorded = recorded.saturating_add(1);
                    tracing::debug!(%model, phase = %RunPhase::Recorded, "run phase");
                }

                pause(self.config.pacing().cooldown());
            }
        }

        Ok(recorded)
    }

    /// Performs the untimed warm-up executions of the workload on the calling thread.
    pub fn warm_up(&self) {
        let warmup = self.config.warmup();

        if warmup.rounds() == 0 {
            return;
        }

        tracing::info!(
            rounds = warmup.rounds(),
            iterations = warmup.iterations(),
            "warming up"
        );

        let workload = Workload::new(warmup.iterations());

        for _ in 0..warmup.rounds() {
            workload.execute();
        }

        tracing::info!("warm-up complete");
    }

    /// Executes one timed run of `num_tasks` tasks under `model`, without recording it.
    ///
    /// The measured interval starts immediately before the release gate opens and ends
    /// immediately after the last task signals completion. Unit creation, the settle delay
    /// and teardown are not measured.
    ///
    /// # Errors
    ///
    /// Returns an error if the execution units could not be created or any of them panicked.
    pub fn execute_run<W>(
        &self,
        model: ExecutionModel,
        num_tasks: NonZero<usize>,
        work: &Arc<W>,
    ) -> Result<BenchmarkRun, SweepError>
    where
        W: Work,
    {
        let prepared = model.prepare(num_tasks, work)?;
        tracing::debug!(
            %model,
            phase = %RunPhase::Built,
            units = prepared.unit_count(),
            "run phase"
        );

        tracing::debug!(%model, phase = %RunPhase::Settling, "run phase");
        pause(self.settle_delay(model));

        let stopwatch = Stopwatch::start();
        prepared.release();
        tracing::debug!(%model, phase = %RunPhase::Released, "run phase");

        prepared.await_all_done();
        let elapsed = stopwatch.stop();
        tracing::debug!(%model, phase = %RunPhase::Draining, ?elapsed, "run phase");

        prepared.teardown()?;

        Ok(BenchmarkRun::new(
            model,
            num_tasks,
            self.config.iterations_per_task(),
            elapsed,
        ))
    }

    fn settle_delay(&self, model: ExecutionModel) -> Duration {
        match model {
            ExecutionModel::Pooled { .. } => self.config.pacing().pooled_settle(),
            ExecutionModel::PerTask => self.config.pacing().per_task_settle(),
        }
    }
}

/// Progress lines go to stdout next to the configuration banner, independent of the log filter.
fn start_line(
    model: ExecutionModel,
    num_tasks: NonZero<usize>,
    repetition: usize,
    repetitions: NonZero<usize>,
) -> String {
    format!(
        "Running {model} (N={num_tasks}, M={pool_size}) rep {repetition}/{repetitions}",
        pool_size = display_pool_size(model),
    )
}

fn finish_line(run: &BenchmarkRun) -> String {
    format!(" -> {} time = {} ms", run.model(), run.elapsed_ms())
}

fn display_pool_size(model: ExecutionModel) -> String {
    model
        .pool_size()
        .map_or_else(|| "-".to_owned(), |pool_size| pool_size.to_string())
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
