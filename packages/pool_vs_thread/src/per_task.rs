use std::num::NonZero;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::model::{Units, join_units, spawn_units};
use crate::{ExecutionModel, GateOutcome, PreparedRun, StartCompletionBarrier, SweepError, Work};

/// Execution units of a per-task run: one dedicated thread per task, each bound to exactly one
/// workload call and one completion token.
///
/// There is no queue and no reuse. A unit's lifetime ends when its task completes, so teardown
/// only has to join threads that have already finished.
#[derive(Debug)]
pub(crate) struct PerTaskExecution {
    units: Vec<JoinHandle<()>>,
}

impl PerTaskExecution {
    pub(crate) fn start<W>(
        num_tasks: NonZero<usize>,
        work: &Arc<W>,
    ) -> Result<PreparedRun, SweepError>
    where
        W: Work,
    {
        let (barrier, tokens) = StartCompletionBarrier::new(num_tasks);

        let bodies = tokens.into_iter().enumerate().map(|(task_index, token)| {
            let barrier = Arc::clone(&barrier);
            let work = Arc::clone(work);

            (format!("worker-{task_index}"), move || {
                match barrier.await_release() {
                    GateOutcome::Released => work.execute(),
                    GateOutcome::Interrupted => {
                        tracing::warn!(task_index, "unit interrupted before release");
                    }
                }

                drop(token);
            })
        });

        let units = spawn_units(&barrier, bodies)?;

        tracing::debug!(units = units.len(), "per-task run built");

        Ok(PreparedRun::new(
            ExecutionModel::PerTask,
            barrier,
            Units::PerTask(Self { units }),
        ))
    }

    pub(crate) fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn teardown(self) -> Result<(), SweepError> {
        join_units(self.units)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;

    use new_zealand::nz;
    use testing::with_watchdog;

    use super::*;

    #[derive(Debug, Default)]
    struct RecordingWork {
        executions: Mutex<Vec<(thread::ThreadId, Instant)>>,
    }

    impl Work for RecordingWork {
        fn execute(&self) {
            self.executions
                .lock()
                .unwrap()
                .push((thread::current().id(), Instant::now()));
        }
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn one_unit_per_task_each_executing_once() {
        with_watchdog(|| {
            for num_tasks in [nz!(1), nz!(7), nz!(64)] {
                let work = Arc::new(RecordingWork::default());

                let run = ExecutionModel::PerTask.prepare(num_tasks, &work).unwrap();

                assert_eq!(run.unit_count(), num_tasks.get());
                assert_eq!(run.barrier().remaining(), num_tasks.get());

                run.release();
                run.await_all_done();
                assert_eq!(run.barrier().remaining(), 0);
                run.teardown().unwrap();

                let executions = work.executions.lock().unwrap();
                let distinct_threads = executions
                    .iter()
                    .map(|(thread_id, _)| *thread_id)
                    .collect::<HashSet<_>>();

                assert_eq!(executions.len(), num_tasks.get());
                assert_eq!(distinct_threads.len(), num_tasks.get());
            }
        });
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn no_execution_precedes_release() {
        with_watchdog(|| {
            let work = Arc::new(RecordingWork::default());

            let run = ExecutionModel::PerTask.prepare(nz!(16), &work).unwrap();

            run.release();
            run.await_all_done();

            let released_at = run.barrier().released_at().unwrap();
            run.teardown().unwrap();

            for (_, executed_at) in work.executions.lock().unwrap().iter() {
                assert!(*executed_at >= released_at);
            }
        });
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn teardown_without_release_interrupts_units() {
        with_watchdog(|| {
            let work = Arc::new(RecordingWork::default());

            let run = ExecutionModel::PerTask.prepare(nz!(5), &work).unwrap();
            run.teardown().unwrap();

            assert!(work.executions.lock().unwrap().is_empty());
        });
    }
}
