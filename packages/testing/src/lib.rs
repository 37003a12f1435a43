#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for the tests of the benchmark packages.

use std::env;
use std::panic;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Tests that synchronize real threads fail instead of hanging after this long.
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

/// Under Miri, thread synchronization is dramatically slower.
pub const WATCHDOG_TIMEOUT_MIRI: Duration = Duration::from_secs(120);

/// Runs `test_fn` on a separate thread and panics if it does not finish within
/// [`WATCHDOG_TIMEOUT`].
///
/// A barrier that is never released or a completion signal that is never delivered would
/// otherwise hang the test binary forever. Panics from `test_fn` are propagated unchanged.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", `test_fn` is executed
/// directly so that mutation testing can detect mutations that hang.
///
/// # Panics
///
/// Panics if `test_fn` panics or exceeds the timeout.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let answer = with_watchdog(|| 6 * 7);
/// assert_eq!(answer, 42);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let timeout = if cfg!(miri) {
        WATCHDOG_TIMEOUT_MIRI
    } else {
        WATCHDOG_TIMEOUT
    };

    with_watchdog_timeout(timeout, test_fn)
}

/// Like [`with_watchdog`] but with a caller-chosen timeout.
///
/// # Panics
///
/// Panics if `test_fn` panics or exceeds `timeout`.
pub fn with_watchdog_timeout<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::Builder::new()
        .name("watched-test".to_owned())
        .spawn(move || {
            // If the receiver is gone, the watchdog has already fired.
            drop(tx.send(test_fn()));
        })
        .expect("the watchdog could not start the test thread");

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread
                .join()
                .expect("test thread sent its result, so it did not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the watchdog timeout of {timeout:?}");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without producing a result"),
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn returns_result_of_fast_test() {
        assert_eq!(with_watchdog(|| 42), 42);
        assert_eq!(with_watchdog(|| "hello"), "hello");
    }

    #[test]
    #[should_panic(expected = "inner failure")]
    fn propagates_test_panic() {
        with_watchdog(|| -> u32 { panic!("inner failure") });
    }

    #[cfg_attr(miri, ignore)] // Sleeping is slow under Miri.
    #[test]
    fn fires_on_hanging_test() {
        if env::var("MUTATION_TESTING").as_deref() == Ok("1") {
            return;
        }

        let outcome = panic::catch_unwind(|| {
            with_watchdog_timeout(Duration::from_millis(50), || {
                thread::sleep(Duration::from_secs(2));
            });
        });

        assert!(outcome.is_err());
    }
}
