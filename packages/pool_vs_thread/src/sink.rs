use std::fs::File;
use std::path::{Path, PathBuf};

use crate::{BenchmarkRun, SinkError};

/// Header row of the result file.
pub const RESULT_FILE_HEADER: [&str; 5] = [
    "model",
    "poolSize",
    "numTasks",
    "iterationsPerTask",
    "timeMs",
];

/// Receives the record of every completed run, in order.
///
/// The orchestrator calls [`record()`][Self::record] once per run, immediately after the run
/// completes, and aborts the sweep if it fails.
#[cfg_attr(test, mockall::automock)]
pub trait ResultSink {
    /// Persists one completed run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run could not be persisted. The sweep does not continue after
    /// a failure, but everything recorded before it is expected to remain persisted.
    fn record(&mut self, run: BenchmarkRun) -> Result<(), SinkError>;
}

/// In-memory, append-only log of completed runs.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use new_zealand::nz;
/// use pool_vs_thread::{BenchmarkRun, ExecutionModel, ResultLog, ResultSink};
///
/// let mut log = ResultLog::new();
/// log.record(BenchmarkRun::new(
///     ExecutionModel::PerTask,
///     nz!(10),
///     1000,
///     Duration::from_millis(4),
/// ))
/// .unwrap();
///
/// assert_eq!(log.runs().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ResultLog {
    runs: Vec<BenchmarkRun>,
}

impl ResultLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded run, in recording order.
    #[must_use]
    pub fn runs(&self) -> &[BenchmarkRun] {
        &self.runs
    }
}

impl ResultSink for ResultLog {
    fn record(&mut self, run: BenchmarkRun) -> Result<(), SinkError> {
        self.runs.push(run);
        Ok(())
    }
}

/// Writes runs to a CSV file, one row per run, flushing after every row so that a sweep that
/// aborts part-way leaves every completed row on disk.
#[derive(derive_more::Debug)]
pub struct CsvFileSink {
    path: PathBuf,

    #[debug(ignore)]
    writer: csv::Writer<File>,
}

impl CsvFileSink {
    /// Creates (or truncates) the file at `path` and writes the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the header cannot be written.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record(RESULT_FILE_HEADER)?;
        writer.flush()?;

        Ok(Self { path, writer })
    }

    /// The path of the file being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvFileSink {
    fn record(&mut self, run: BenchmarkRun) -> Result<(), SinkError> {
        self.writer.write_record([
            run.model().to_string(),
            run.pool_size_column().to_string(),
            run.num_tasks().to_string(),
            run.iterations_per_task().to_string(),
            run.elapsed_ms().to_string(),
        ])?;

        self.writer.flush()?;

        Ok(())
    }
}
