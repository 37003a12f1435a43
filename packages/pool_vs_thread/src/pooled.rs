use std::num::NonZero;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::queue::ArrayQueue;

use crate::model::{Units, join_units, spawn_units};
use crate::{
    CompletionToken, ExecutionModel, GateOutcome, PreparedRun, StartCompletionBarrier,
    SweepError, Work,
};

/// Execution units of a pooled run: `pool_size` worker threads draining a shared queue that
/// was filled with every task of the run before any worker was started.
///
/// Each queued task carries its own completion token, which the worker drops after executing
/// the task. The pool therefore signals completion once per task, never once per worker.
///
/// If there are fewer tasks than workers, the surplus workers find the queue empty as soon as
/// they are released and exit immediately.
#[derive(derive_more::Debug)]
pub(crate) struct PoolExecution {
    #[debug(ignore)]
    queue: Arc<ArrayQueue<CompletionToken>>,

    workers: Vec<JoinHandle<()>>,
}

impl PoolExecution {
    pub(crate) fn start<W>(
        pool_size: NonZero<usize>,
        num_tasks: NonZero<usize>,
        work: &Arc<W>,
    ) -> Result<PreparedRun, SweepError>
    where
        W: Work,
    {
        let (barrier, tokens) = StartCompletionBarrier::new(num_tasks);

        // The queue is populated before any worker exists, so enqueue cost is never timed.
        let queue = Arc::new(ArrayQueue::new(num_tasks.get()));

        for token in tokens {
            queue
                .push(token)
                .expect("queue capacity is the number of tokens issued for the run");
        }

        let bodies = (0..pool_size.get()).map(|worker_index| {
            let barrier = Arc::clone(&barrier);
            let queue = Arc::clone(&queue);
            let work = Arc::clone(work);

            (format!("pool-worker-{worker_index}"), move || {
                worker_entrypoint(&barrier, &queue, &*work);
            })
        });

        let workers = spawn_units(&barrier, bodies)?;

        tracing::debug!(
            pool_size = workers.len(),
            num_tasks = num_tasks.get(),
            "pooled run built"
        );

        Ok(PreparedRun::new(
            ExecutionModel::Pooled { pool_size },
            barrier,
            Units::Pooled(Self { queue, workers }),
        ))
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Joins every worker. Workers exit by themselves once the queue is empty.
    pub(crate) fn teardown(self) -> Result<(), SweepError> {
        let result = join_units(self.workers);

        debug_assert!(
            self.queue.is_empty() || result.is_err(),
            "workers exit only after the queue has been drained"
        );

        result
    }
}

fn worker_entrypoint<W>(
    barrier: &StartCompletionBarrier,
    queue: &ArrayQueue<CompletionToken>,
    work: &W,
) where
    W: Work + ?Sized,
{
    match barrier.await_release() {
        GateOutcome::Released => {
            // If a task panics, the tasks still queued would otherwise keep their tokens until
            // teardown, which only happens after every token has been dropped.
            let _discard_on_unwind = scopeguard::guard_on_unwind(queue, |queue| {
                tracing::warn!("pool worker panicked, discarding queued tasks");
                discard_queued(queue);
            });

            while let Some(token) = queue.pop() {
                work.execute();
                drop(token);
            }
        }
        GateOutcome::Interrupted => {
            tracing::warn!("pool worker interrupted before release, discarding queued tasks");
            discard_queued(queue);
        }
    }
}

/// Every discarded task still signals completion through its token.
fn discard_queued(queue: &ArrayQueue<CompletionToken>) {
    while let Some(token) = queue.pop() {
        drop(token);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{self, AtomicUsize};
    use std::thread;
    use std::time::Duration;

    use new_zealand::nz;
    use testing::with_watchdog;

    use super::*;

    #[derive(Debug, Default)]
    struct CountingWork {
        executions: AtomicUsize,
        threads: Mutex<HashSet<thread::ThreadId>>,
    }

    impl Work for CountingWork {
        fn execute(&self) {
            self.executions.fetch_add(1, atomic::Ordering::SeqCst);
            self.threads.lock().unwrap().insert(thread::current().id());
        }
    }

    fn execute_pooled(pool_size: NonZero<usize>, num_tasks: NonZero<usize>) -> Arc<CountingWork> {
        let work = Arc::new(CountingWork::default());

        let run = ExecutionModel::Pooled { pool_size }
            .prepare(num_tasks, &work)
            .unwrap();

        assert_eq!(run.unit_count(), pool_size.get());
        assert_eq!(run.barrier().remaining(), num_tasks.get());

        run.release();
        run.await_all_done();

        assert_eq!(run.barrier().remaining(), 0);
        run.teardown().unwrap();

        work
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn every_task_executes_exactly_once() {
        with_watchdog(|| {
            let cases = [(nz!(1), nz!(1)), (nz!(2), nz!(4)), (nz!(4), nz!(100))];

            for (pool_size, num_tasks) in cases {
                let work = execute_pooled(pool_size, num_tasks);

                assert_eq!(
                    work.executions.load(atomic::Ordering::SeqCst),
                    num_tasks.get()
                );
                assert!(work.threads.lock().unwrap().len() <= pool_size.get());
            }
        });
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn fewer_tasks_than_workers_leaves_idle_workers() {
        with_watchdog(|| {
            let work = execute_pooled(nz!(8), nz!(3));

            assert_eq!(work.executions.load(atomic::Ordering::SeqCst), 3);
            assert!(work.threads.lock().unwrap().len() <= 3);
        });
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn nothing_executes_before_release() {
        with_watchdog(|| {
            let work = Arc::new(CountingWork::default());

            let run = ExecutionModel::Pooled { pool_size: nz!(2) }
                .prepare(nz!(10), &work)
                .unwrap();

            thread::sleep(Duration::from_millis(50));
            assert_eq!(work.executions.load(atomic::Ordering::SeqCst), 0);

            run.release();
            run.await_all_done();
            run.teardown().unwrap();

            assert_eq!(work.executions.load(atomic::Ordering::SeqCst), 10);
        });
    }

    #[derive(Debug, Default)]
    struct PanickingWork {
        executions: AtomicUsize,
    }

    impl Work for PanickingWork {
        fn execute(&self) {
            self.executions.fetch_add(1, atomic::Ordering::SeqCst);
            panic!("intentional panic inside a pooled task");
        }
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn panicking_workers_still_complete_the_run() {
        with_watchdog(|| {
            for pool_size in [nz!(1), nz!(3)] {
                let work = Arc::new(PanickingWork::default());

                let run = ExecutionModel::Pooled { pool_size }
                    .prepare(nz!(10), &work)
                    .unwrap();

                run.release();
                run.await_all_done();

                assert_eq!(run.barrier().remaining(), 0);

                // Each worker dies on its first task. The rest of the queue is discarded.
                let executions = work.executions.load(atomic::Ordering::SeqCst);
                assert!(executions >= 1);
                assert!(executions <= pool_size.get());

                let SweepError::UnitPanicked { unit_name } = run.teardown().unwrap_err() else {
                    panic!("expected a panicked unit to be reported");
                };
                assert!(unit_name.starts_with("pool-worker-"));
            }
        });
    }

    #[cfg_attr(miri, ignore)] // Real threads are slow under Miri.
    #[test]
    fn interrupted_pool_signals_every_task_without_executing() {
        with_watchdog(|| {
            let work = Arc::new(CountingWork::default());

            let run = ExecutionModel::Pooled { pool_size: nz!(3) }
                .prepare(nz!(20), &work)
                .unwrap();

            run.interrupt();
            run.await_all_done();

            assert_eq!(run.barrier().remaining(), 0);
            assert!(run.barrier().is_interrupted());
            run.teardown().unwrap();

            assert_eq!(work.executions.load(atomic::Ordering::SeqCst), 0);
        });
    }
}
