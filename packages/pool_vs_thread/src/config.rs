use std::fmt;
use std::num::NonZero;
use std::str::FromStr;
use std::time::Duration;

use many_cpus::ProcessorSet;
use new_zealand::nz;

use crate::ConfigError;

/// Iterations performed by every task unless configured otherwise.
pub const DEFAULT_ITERATIONS_PER_TASK: u64 = 1_000_000;

/// Repetitions of every (task count, model) pair unless configured otherwise.
pub const DEFAULT_REPETITIONS: NonZero<usize> = nz!(3);

/// Task counts swept unless configured otherwise.
pub const DEFAULT_TASK_COUNTS: [NonZero<usize>; 4] = [nz!(10), nz!(100), nz!(500), nz!(1000)];

/// How many positional arguments [`SweepConfig::from_positional_args()`] accepts.
pub const MAX_POSITIONAL_ARGS: usize = 3;

/// Complete configuration of a sweep.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use pool_vs_thread::{PacingConfig, SweepConfig, TaskCounts, WarmupConfig};
///
/// let config = SweepConfig::new(1000, nz!(2), "4,8".parse::<TaskCounts>().unwrap())
///     .with_repetitions(nz!(1))
///     .with_warmup(WarmupConfig::disabled())
///     .with_pacing(PacingConfig::none());
///
/// assert_eq!(config.total_runs(), 4);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SweepConfig {
    iterations_per_task: u64,
    pool_size: NonZero<usize>,
    task_counts: TaskCounts,
    repetitions: NonZero<usize>,
    warmup: WarmupConfig,
    pacing: PacingConfig,
}

impl SweepConfig {
    /// Creates a configuration with the default repetitions, warm-up and pacing.
    #[must_use]
    pub fn new(
        iterations_per_task: u64,
        pool_size: NonZero<usize>,
        task_counts: TaskCounts,
    ) -> Self {
        Self {
            iterations_per_task,
            pool_size,
            task_counts,
            repetitions: DEFAULT_REPETITIONS,
            warmup: WarmupConfig::default(),
            pacing: PacingConfig::default(),
        }
    }

    /// Sets how many times every (task count, model) pair is executed.
    #[must_use]
    pub fn with_repetitions(mut self, repetitions: NonZero<usize>) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Sets the untimed warm-up performed before the first run.
    #[must_use]
    pub fn with_warmup(mut self, warmup: WarmupConfig) -> Self {
        self.warmup = warmup;
        self
    }

    /// Sets the settle and cooldown delays between runs.
    #[must_use]
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Iterations performed by every task.
    #[must_use]
    pub fn iterations_per_task(&self) -> u64 {
        self.iterations_per_task
    }

    /// Worker count of the pooled model.
    #[must_use]
    pub fn pool_size(&self) -> NonZero<usize> {
        self.pool_size
    }

    /// Task counts to sweep, in order.
    #[must_use]
    pub fn task_counts(&self) -> &TaskCounts {
        &self.task_counts
    }

    /// How many times every (task count, model) pair is executed.
    #[must_use]
    pub fn repetitions(&self) -> NonZero<usize> {
        self.repetitions
    }

    /// Untimed warm-up performed before the first run.
    #[must_use]
    pub fn warmup(&self) -> WarmupConfig {
        self.warmup
    }

    /// Settle and cooldown delays.
    #[must_use]
    pub fn pacing(&self) -> PacingConfig {
        self.pacing
    }

    /// The number of runs (and therefore result rows) the sweep produces.
    #[must_use]
    pub fn total_runs(&self) -> usize {
        const MODELS_PER_REPETITION: usize = 2;

        self.task_counts
            .len()
            .saturating_mul(self.repetitions.get())
            .saturating_mul(MODELS_PER_REPETITION)
    }

    /// Builds a configuration from the positional command line arguments
    /// `[iterations_per_task] [pool_size] [task_counts]`.
    ///
    /// Every argument is optional. A missing argument takes its default value: 1 000 000
    /// iterations, one worker per processor and the task counts `10,100,500,1000`.
    ///
    /// # Errors
    ///
    /// Returns an error if any argument is malformed or if there are more than
    /// [`MAX_POSITIONAL_ARGS`] arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use pool_vs_thread::SweepConfig;
    ///
    /// let config = SweepConfig::from_positional_args(&["1000", "2", "4,8"]).unwrap();
    ///
    /// assert_eq!(config.iterations_per_task(), 1000);
    /// assert_eq!(config.pool_size().get(), 2);
    /// assert_eq!(config.task_counts().to_string(), "[4, 8]");
    /// ```
    pub fn from_positional_args<S>(args: &[S]) -> Result<Self, ConfigError>
    where
        S: AsRef<str>,
    {
        let mut args = args.iter().map(AsRef::<str>::as_ref);

        let iterations_per_task = args
            .next()
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidIterationCount {
                        invalid_value: value.to_owned(),
                        problem: e.to_string(),
                    })
            })
            .transpose()?
            .unwrap_or(DEFAULT_ITERATIONS_PER_TASK);

        let pool_size = args
            .next()
            .map(|value| {
                value
                    .parse::<NonZero<usize>>()
                    .map_err(|e| ConfigError::InvalidPoolSize {
                        invalid_value: value.to_owned(),
                        problem: e.to_string(),
                    })
            })
            .transpose()?;

        let task_counts = args.next().map(str::parse::<TaskCounts>).transpose()?;

        if let Some(extra) = args.next() {
            return Err(ConfigError::UnexpectedArgument {
                argument: extra.to_owned(),
                max_count: MAX_POSITIONAL_ARGS,
            });
        }

        Ok(Self::new(
            iterations_per_task,
            pool_size.unwrap_or_else(default_pool_size),
            task_counts.unwrap_or_default(),
        ))
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_ITERATIONS_PER_TASK,
            default_pool_size(),
            TaskCounts::default(),
        )
    }
}

/// The pool size used when none is configured: one worker per processor available to the
/// current process.
#[must_use]
pub fn default_pool_size() -> NonZero<usize> {
    NonZero::new(ProcessorSet::default().len())
        .expect("guarded by ProcessorSet never being empty")
}

/// Untimed workload executions that prime caches and branch predictors before the first run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WarmupConfig {
    rounds: usize,
    iterations: u64,
}

impl WarmupConfig {
    /// Performs `rounds` workload executions of `iterations` iterations each.
    #[must_use]
    pub const fn new(rounds: usize, iterations: u64) -> Self {
        Self { rounds, iterations }
    }

    /// No warm-up at all.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// How many warm-up executions are performed.
    #[must_use]
    pub const fn rounds(&self) -> usize {
        self.rounds
    }

    /// Iterations per warm-up execution.
    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self::new(4, 100_000)
    }
}

/// Fixed delays the orchestrator inserts around runs.
///
/// The settle delays give freshly spawned units time to reach the release gate before it opens.
/// This only affects measurement fairness: a unit that arrives after release still passes the
/// gate. The cooldown follows every repetition pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PacingConfig {
    pooled_settle: Duration,
    per_task_settle: Duration,
    cooldown: Duration,
}

impl PacingConfig {
    /// Creates a pacing configuration from explicit delays.
    #[must_use]
    pub const fn new(
        pooled_settle: Duration,
        per_task_settle: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            pooled_settle,
            per_task_settle,
            cooldown,
        }
    }

    /// No delays at all.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Delay between building a pooled run and releasing it.
    #[must_use]
    pub const fn pooled_settle(&self) -> Duration {
        self.pooled_settle
    }

    /// Delay between building a per-task run and releasing it.
    #[must_use]
    pub const fn per_task_settle(&self) -> Duration {
        self.per_task_settle
    }

    /// Delay after every repetition pair.
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(100),
            Duration::from_millis(50),
            Duration::from_millis(200),
        )
    }
}

/// Non-empty, ordered list of task counts to sweep.
///
/// Parses from a comma-separated list such as `10,100,500`. Whitespace around entries is
/// ignored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TaskCounts(Vec<NonZero<usize>>);

impl TaskCounts {
    /// Creates a list of task counts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyTaskCounts`] if `counts` is empty.
    pub fn new(counts: impl IntoIterator<Item = NonZero<usize>>) -> Result<Self, ConfigError> {
        let counts = counts.into_iter().collect::<Vec<_>>();

        if counts.is_empty() {
            return Err(ConfigError::EmptyTaskCounts);
        }

        Ok(Self(counts))
    }

    /// The number of task counts in the list.
    #[must_use]
    #[expect(clippy::len_without_is_empty, reason = "never empty by definition")]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the task counts in sweep order.
    pub fn iter(&self) -> impl Iterator<Item = NonZero<usize>> + '_ {
        self.0.iter().copied()
    }
}

impl Default for TaskCounts {
    fn default() -> Self {
        Self(DEFAULT_TASK_COUNTS.to_vec())
    }
}

impl FromStr for TaskCounts {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let counts = s
            .split(',')
            .map(str::trim)
            .map(|entry| {
                entry
                    .parse::<NonZero<usize>>()
                    .map_err(|e| ConfigError::InvalidTaskCount {
                        invalid_value: entry.to_owned(),
                        problem: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(counts)
    }
}

impl fmt::Display for TaskCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;

        for (index, count) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }

            write!(f, "{count}")?;
        }

        write!(f, "]")
    }
}
