use std::io;

use thiserror::Error;

/// The sweep configuration could not be constructed from user input.
///
/// These errors are always raised before the first run starts, so no partial results exist.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The list of task counts was empty.
    #[error("task count list must contain at least one entry")]
    EmptyTaskCounts,

    /// The iterations per task argument was not a non-negative integer.
    #[error("invalid iterations per task '{invalid_value}': {problem}")]
    InvalidIterationCount {
        /// The argument that failed to parse.
        invalid_value: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// The pool size argument was not a positive integer.
    #[error("invalid pool size '{invalid_value}': {problem}")]
    InvalidPoolSize {
        /// The argument that failed to parse.
        invalid_value: String,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// More positional arguments were given than the command line accepts.
    #[error("unexpected argument '{argument}': at most {max_count} positional arguments allowed")]
    UnexpectedArgument {
        /// The first argument beyond the accepted ones.
        argument: String,

        /// How many positional arguments are accepted.
        max_count: usize,
    },

    /// One entry in the list of task counts was not a positive integer.
    #[error("invalid task count '{invalid_value}': {problem}")]
    InvalidTaskCount {
        /// The entry that failed to parse, after trimming whitespace.
        invalid_value: String,

        /// A human-readable description of the problem.
        problem: String,
    },
}

/// The result sink failed to persist a row.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    /// The result file could not be created or flushed.
    #[error("result file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The CSV writer rejected a record.
    #[error("result file CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),
}

/// A sweep was aborted. Rows recorded before the failure remain persisted.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SweepError {
    /// The operating system refused to create an execution unit.
    #[error("failed to spawn execution unit {unit_index}: {source}")]
    Spawn {
        /// Zero-based index of the unit that could not be created.
        unit_index: usize,

        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },

    /// An execution unit panicked instead of returning normally.
    #[error("execution unit '{unit_name}' panicked")]
    UnitPanicked {
        /// The thread name of the unit that panicked.
        unit_name: String,
    },

    /// The result sink could not record a completed run.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(ConfigError: Send, Sync, Debug);
    assert_impl_all!(SinkError: Send, Sync, Debug);
    assert_impl_all!(SweepError: Send, Sync, Debug);

    #[test]
    fn spawn_error_names_unit() {
        let error = SweepError::Spawn {
            unit_index: 7,
            source: io::Error::other("out of threads"),
        };

        let message = error.to_string();
        assert!(message.contains("unit 7"));
        assert!(message.contains("out of threads"));
    }

    #[test]
    fn sink_error_is_transparent_in_sweep_error() {
        let error = SweepError::from(SinkError::Io(io::Error::other("disk full")));

        assert_eq!(error.to_string(), "result file I/O failed: disk full");
    }
}
