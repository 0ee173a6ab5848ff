//! Logging infrastructure for foldq.
//!
//! This module provides:
//! - Process-wide `tracing` setup (console plus an optional rolling file)
//! - Per-job loggers with file + console dual output
//! - Tail buffer for error diagnosis
//!
//! # Example
//!
//! ```no_run
//! use foldq_core::logging::{stdout_console, JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("/results/job_a/pipeline.log", LogConfig::default(), stdout_console()).unwrap();
//! logger.command("python3 run_docker.py --fasta_paths=job_a.fasta");
//! logger.output_line("I0101 12:00:00 predicting model_1");
//! logger.success("Pipeline finished");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{stdout_console, ConsoleSink, LogConfig, LogLevel, MessagePrefix};

use std::path::Path;

pub use tracing_appender::non_blocking::WorkerGuard;

use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
/// - Mirrors into a daily file `foldq.<date>.log` under `log_dir`, if given
///
/// Should be called once at application startup. Keep the returned guard
/// alive for as long as file logging should keep flushing.
pub fn init_tracing(
    default_level: LogLevel,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, InitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("foldq")
                .filename_suffix("log")
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}
