#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Measures the cost difference between two ways of executing the same CPU-bound tasks on
//! real threads:
//!
//! * **Pooled** (`NM`): N tasks are served by M long-lived worker threads draining a shared
//!   queue.
//! * **Per-task** (`1to1`): every one of the N tasks gets its own dedicated, single-use thread.
//!
//! # Operating principles
//!
//! For every run, all execution units are created first and block on the release gate of a
//! [`StartCompletionBarrier`]. After a short settle delay the orchestrator starts a
//! [`Stopwatch`], opens the gate and waits for the completion counter to reach zero. Only that
//! interval is measured: unit creation, queue population and teardown are excluded, while the
//! scheduling latency between release and the start of each task is included.
//!
//! Runs never overlap. The [`Orchestrator`] executes the sweep over every configured task
//! count and repetition sequentially and hands one [`BenchmarkRun`] per run to a
//! [`ResultSink`], such as the [`CsvFileSink`] used by the `pool_vs_thread` binary.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use new_zealand::nz;
//! use pool_vs_thread::{
//!     ExecutionModel, Orchestrator, PacingConfig, SweepConfig, WarmupConfig, Workload,
//! };
//!
//! let config = SweepConfig::new(1000, nz!(2), "4".parse().unwrap())
//!     .with_warmup(WarmupConfig::disabled())
//!     .with_pacing(PacingConfig::none());
//!
//! let orchestrator = Orchestrator::new(config);
//! let work = Arc::new(Workload::new(1000));
//!
//! let run = orchestrator
//!     .execute_run(ExecutionModel::PerTask, nz!(4), &work)
//!     .unwrap();
//!
//! println!("{} tasks took {:?}", run.num_tasks(), run.elapsed());
//! ```
//!
//! This package is a development tool for performance analysis, not a production scheduler.

mod barrier;
mod config;
mod error;
mod model;
mod orchestrator;
mod per_task;
mod pooled;
mod run;
mod sink;
mod timer;
mod workload;

pub use barrier::*;
pub use config::*;
pub use error::*;
pub use model::{ExecutionModel, PreparedRun};
pub use orchestrator::*;
pub use run::*;
pub use sink::*;
pub use timer::*;
pub use workload::*;
