use std::iter;
use std::num::NonZero;
use std::sync::atomic::{self, AtomicBool, AtomicUsize};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use rsevents::{Awaitable, EventState, ManualResetEvent};

/// Two-phase synchronization shared by the orchestrator and every execution unit of one run.
///
/// Phase 1 is a release gate: units call [`await_release()`][Self::await_release] and stay
/// blocked until the orchestrator calls [`release()`][Self::release]. The gate is a manual-reset
/// event, so once released it stays released and a unit that arrives late passes straight
/// through.
///
/// Phase 2 is a completion counter: the barrier is created together with exactly one
/// [`CompletionToken`] per task and the counter reaches zero when all tokens have been dropped.
/// The orchestrator waits for that with [`await_all_done()`][Self::await_all_done].
///
/// Because a token signals on drop and cannot be cloned, every task signals exactly once on
/// every exit path, including unwinding out of a panicking workload.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use new_zealand::nz;
/// use pool_vs_thread::{GateOutcome, StartCompletionBarrier};
///
/// let (barrier, tokens) = StartCompletionBarrier::new(nz!(2));
///
/// let handles = tokens
///     .into_iter()
///     .map(|token| {
///         let barrier = Arc::clone(&barrier);
///         thread::spawn(move || {
///             assert_eq!(barrier.await_release(), GateOutcome::Released);
///             drop(token);
///         })
///     })
///     .collect::<Vec<_>>();
///
/// barrier.release();
/// barrier.await_all_done();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// ```
#[derive(derive_more::Debug)]
pub struct StartCompletionBarrier {
    #[debug(ignore)]
    gate: ManualResetEvent,

    // Written once, before the gate opens. Units read it only after passing the gate.
    interrupted: AtomicBool,
    released_at: OnceLock<Instant>,

    remaining: AtomicUsize,
    #[debug(ignore)]
    all_done: ManualResetEvent,
}

/// How a unit left the release gate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum GateOutcome {
    /// The orchestrator released the gate; the unit should execute its work.
    Released,

    /// The run was interrupted before release; the unit must not execute its work.
    Interrupted,
}

impl StartCompletionBarrier {
    /// Creates a barrier for a run of `task_count` tasks, together with one completion token
    /// per task.
    ///
    /// The caller hands each token to whichever unit executes the associated task.
    #[must_use]
    pub fn new(task_count: NonZero<usize>) -> (Arc<Self>, Vec<CompletionToken>) {
        let barrier = Arc::new(Self {
            gate: ManualResetEvent::new(EventState::Unset),
            interrupted: AtomicBool::new(false),
            released_at: OnceLock::new(),
            remaining: AtomicUsize::new(task_count.get()),
            all_done: ManualResetEvent::new(EventState::Unset),
        });

        let tokens = iter::repeat_with(|| CompletionToken {
            barrier: Arc::clone(&barrier),
        })
        .take(task_count.get())
        .collect();

        (barrier, tokens)
    }

    /// Blocks the calling unit until the gate is released or the run is interrupted.
    ///
    /// Returns immediately if that has already happened.
    pub fn await_release(&self) -> GateOutcome {
        self.gate.wait();

        if self.interrupted.load(atomic::Ordering::Acquire) {
            GateOutcome::Interrupted
        } else {
            GateOutcome::Released
        }
    }

    /// Opens the gate, unblocking all current and future waiters.
    ///
    /// The release instant is recorded before any waiter can be woken up. Calling this more
    /// than once, or after [`interrupt()`][Self::interrupt], has no effect.
    pub fn release(&self) {
        if self.gate_opened() {
            return;
        }

        self.released_at.get_or_init(Instant::now);
        self.gate.set();
    }

    /// Opens the gate in the interrupted state.
    ///
    /// Waiters observe [`GateOutcome::Interrupted`], skip their work and drop their tokens.
    /// Has no effect if the gate has already been released.
    pub fn interrupt(&self) {
        if self.gate_opened() {
            return;
        }

        self.interrupted.store(true, atomic::Ordering::Release);
        self.gate.set();
    }

    /// Blocks until every completion token of the run has been dropped.
    pub fn await_all_done(&self) {
        self.all_done.wait();
    }

    /// The number of tasks that have not yet signaled completion.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(atomic::Ordering::Acquire)
    }

    /// The instant the gate was released, if it has been released.
    #[must_use]
    pub fn released_at(&self) -> Option<Instant> {
        self.released_at.get().copied()
    }

    /// Whether the run was interrupted instead of released.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(atomic::Ordering::Acquire)
    }

    fn gate_opened(&self) -> bool {
        // The orchestrator is the only caller of release() and interrupt(), so there is no race
        // between this check and the subsequent state change.
        self.released_at.get().is_some() || self.interrupted.load(atomic::Ordering::Acquire)
    }

    fn signal_done(&self) {
        let previous = self.remaining.fetch_sub(1, atomic::Ordering::AcqRel);

        debug_assert!(previous > 0, "more completion signals than tasks in the run");

        if previous == 1 {
            self.all_done.set();
        }
    }
}

/// Proof that one task of a run has not yet signaled completion.
///
/// Dropping the token signals completion. Tokens are created only by
/// [`StartCompletionBarrier::new()`] and cannot be cloned.
#[derive(Debug)]
#[must_use = "dropping the token immediately signals the task as completed"]
pub struct CompletionToken {
    barrier: Arc<StartCompletionBarrier>,
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        self.barrier.signal_done();
    }
}
