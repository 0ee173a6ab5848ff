//! Job orchestration: the worker loop and the external steps it runs.
//!
//! # Architecture
//!
//! ```text
//! Worker::run_once
//!     ├── JobSelector   pick urgent-then-oldest descriptor
//!     ├── JobValidator  reject bad descriptors → failed_jobs/
//!     ├── JobBuilder    defaults and paths → ResolvedJob
//!     ├── Step: Predict        (pipeline.log)
//!     ├── Step: Post-process   (postprocess.log, only after success)
//!     └── QueueLayout   move to done_jobs/ or failed_jobs/, write summary
//! ```
//!
//! # Example
//!
//! ```no_run
//! use foldq_core::logging::stdout_console;
//! use foldq_core::orchestrator::Worker;
//!
//! let worker = Worker::new("/srv/foldq", stdout_console());
//! worker.run().unwrap();
//! ```

mod errors;
mod runner;
mod step;
pub mod steps;
mod types;
mod worker;

pub use errors::{StepError, StepResult, WorkerError, WorkerResult};
pub use runner::{run_step, SIGNAL_EXIT_CODE};
pub use step::ExternalStep;
pub use types::{Context, Cycle, JobOutcome, StepRun, ToolCommand};
pub use worker::Worker;
