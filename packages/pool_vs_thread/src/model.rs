use std::num::NonZero;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::per_task::PerTaskExecution;
use crate::pooled::PoolExecution;
use crate::{StartCompletionBarrier, SweepError, Work};

/// Describes how the tasks of one run are mapped onto execution units.
///
/// The [`Display`][std::fmt::Display] form is the token used in the result file.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ExecutionModel {
    /// A fixed number of long-lived worker threads drain a shared queue of tasks.
    #[display("NM")]
    Pooled {
        /// How many worker threads serve the tasks of the run.
        pool_size: NonZero<usize>,
    },

    /// Every task gets its own dedicated, single-use thread.
    #[display("1to1")]
    PerTask,
}

impl ExecutionModel {
    /// The pool size, or `None` for models where it is not meaningful.
    #[must_use]
    pub const fn pool_size(&self) -> Option<NonZero<usize>> {
        match self {
            Self::Pooled { pool_size } => Some(*pool_size),
            Self::PerTask => None,
        }
    }

    /// Constructs the execution units and barrier for a run of `num_tasks` tasks.
    ///
    /// When this returns, every unit has been spawned and will block on the release gate
    /// before executing any work. Nothing runs until [`PreparedRun::release()`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::Spawn`] if the operating system refuses to create a thread. Any
    /// units created before the failure are interrupted and joined before returning.
    pub fn prepare<W>(
        &self,
        num_tasks: NonZero<usize>,
        work: &Arc<W>,
    ) -> Result<PreparedRun, SweepError>
    where
        W: Work,
    {
        match self {
            Self::Pooled { pool_size } => PoolExecution::start(*pool_size, num_tasks, work),
            Self::PerTask => PerTaskExecution::start(num_tasks, work),
        }
    }
}

/// A run whose execution units are live and blocked on the release gate.
///
/// The orchestrator drives it through release, draining and teardown. Dropping a prepared run
/// without releasing it interrupts the units so that no thread stays blocked forever.
#[derive(Debug)]
pub struct PreparedRun {
    model: ExecutionModel,
    barrier: Arc<StartCompletionBarrier>,
    units: Option<Units>,
}

#[derive(Debug)]
pub(crate) enum Units {
    Pooled(PoolExecution),
    PerTask(PerTaskExecution),
}

impl Units {
    fn len(&self) -> usize {
        match self {
            Self::Pooled(pool) => pool.worker_count(),
            Self::PerTask(units) => units.unit_count(),
        }
    }

    fn teardown(self) -> Result<(), SweepError> {
        match self {
            Self::Pooled(pool) => pool.teardown(),
            Self::PerTask(units) => units.teardown(),
        }
    }
}

impl PreparedRun {
    pub(crate) fn new(
        model: ExecutionModel,
        barrier: Arc<StartCompletionBarrier>,
        units: Units,
    ) -> Self {
        Self {
            model,
            barrier,
            units: Some(units),
        }
    }

    /// The execution model this run was prepared for.
    #[must_use]
    pub fn model(&self) -> ExecutionModel {
        self.model
    }

    /// The barrier shared by the orchestrator and the units of this run.
    #[must_use]
    pub fn barrier(&self) -> &StartCompletionBarrier {
        &self.barrier
    }

    /// How many execution units (threads) were spawned for this run.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.as_ref().map_or(0, Units::len)
    }

    /// Releases every unit of the run at once.
    pub fn release(&self) {
        self.barrier.release();
    }

    /// Interrupts the run before release. Units skip their work but still signal completion.
    pub fn interrupt(&self) {
        self.barrier.interrupt();
    }

    /// Blocks until every task of the run has signaled completion.
    pub fn await_all_done(&self) {
        self.barrier.await_all_done();
    }

    /// Stops and joins every unit of the run.
    ///
    /// If the run was never released, it is interrupted first.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::UnitPanicked`] if any unit panicked.
    pub fn teardown(mut self) -> Result<(), SweepError> {
        self.barrier.interrupt();

        match self.units.take() {
            Some(units) => units.teardown(),
            None => Ok(()),
        }
    }
}

impl Drop for PreparedRun {
    #[cfg_attr(test, mutants::skip)] // Impractical to test that threads stop blocking.
    fn drop(&mut self) {
        if self.units.is_some() {
            // Has no effect if the run was already released.
            self.barrier.interrupt();
        }
    }
}

/// Spawns one thread per entry of `bodies`, returning their join handles.
///
/// If spawning fails part-way, the barrier is interrupted so that already-spawned units wake
/// up, signal completion and exit, and they are joined before the error is returned.
pub(crate) fn spawn_units<F>(
    barrier: &StartCompletionBarrier,
    bodies: impl IntoIterator<Item = (String, F)>,
) -> Result<Vec<JoinHandle<()>>, SweepError>
where
    F: FnOnce() + Send + 'static,
{
    let bodies = bodies.into_iter();
    let handles: Vec<JoinHandle<()>> = Vec::with_capacity(bodies.size_hint().0);

    let mut handles = scopeguard::guard(handles, |handles| {
        barrier.interrupt();

        for handle in handles {
            // We are already reporting the spawn failure, which is the more useful error.
            drop(handle.join());
        }
    });

    for (unit_index, (name, body)) in bodies.enumerate() {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(body)
            .map_err(|source| SweepError::Spawn { unit_index, source })?;

        handles.push(handle);
    }

    Ok(scopeguard::ScopeGuard::into_inner(handles))
}

/// Joins every unit, reporting the first one that panicked.
pub(crate) fn join_units(handles: Vec<JoinHandle<()>>) -> Result<(), SweepError> {
    let mut first_panic = None;

    for handle in handles {
        let unit_name = handle.thread().name().unwrap_or("<unnamed>").to_owned();

        if handle.join().is_err() && first_panic.is_none() {
            first_panic = Some(SweepError::UnitPanicked { unit_name });
        }
    }

    first_panic.map_or(Ok(()), Err)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn display_uses_result_file_tokens() {
        let pooled = ExecutionModel::Pooled { pool_size: nz!(4) };

        assert_eq!(pooled.to_string(), "NM");
        assert_eq!(ExecutionModel::PerTask.to_string(), "1to1");
    }

    #[test]
    fn pool_size_only_for_pooled() {
        let pooled = ExecutionModel::Pooled { pool_size: nz!(3) };

        assert_eq!(pooled.pool_size(), Some(nz!(3)));
        assert_eq!(ExecutionModel::PerTask.pool_size(), None);
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn join_units_reports_panicking_unit() {
        testing::with_watchdog(|| {
            let (barrier, tokens) = StartCompletionBarrier::new(nz!(2));

            let bodies = tokens.into_iter().enumerate().map(|(index, token)| {
                let barrier = Arc::clone(&barrier);
                let body = move || {
                    let _token = token;
                    barrier.await_release();
                    assert!(index != 1, "intentional panic in unit 1");
                };

                (format!("unit-{index}"), body)
            });

            let handles = spawn_units(&barrier, bodies).unwrap();
            barrier.release();
            barrier.await_all_done();

            let error = join_units(handles).unwrap_err();
            assert!(matches!(
                error,
                SweepError::UnitPanicked { ref unit_name } if unit_name == "unit-1"
            ));
        });
    }
}
