//! foldq binary entry point

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use foldq_core::logging::{init_tracing, stdout_console, WorkerGuard};
use foldq_core::orchestrator::Worker;

#[derive(Parser, Debug)]
#[command(name = "foldq")]
#[command(version = concat!("(", env!("CARGO_PKG_VERSION"), ")"))]
#[command(about = "Runs queued structure prediction jobs one at a time")]
#[command(disable_version_flag = true)]
struct Args {
    /// Run directory holding settings.toml and the input/ queue
    directory: PathBuf,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // No subscriber exists until setup succeeds, so its errors go to stderr.
    let (worker, _guard) = match setup(&args) {
        Ok(ready) => ready,
        Err(e) => {
            eprintln!("foldq: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match worker.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", anyhow::Error::from(e));
            ExitCode::FAILURE
        }
    }
}

/// Open the run directory, load settings and start tracing.
fn setup(args: &Args) -> Result<(Worker, Option<WorkerGuard>)> {
    let run_dir = args
        .directory
        .canonicalize()
        .with_context(|| format!("Cannot open run directory '{}'", args.directory.display()))?;

    let worker = Worker::new(&run_dir, stdout_console());
    worker.check_queue()?;
    let settings = worker.load_settings()?;

    let log_dir = if settings.logging.worker_log {
        let dir = worker.layout().logs_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;
        Some(dir)
    } else {
        None
    };
    let guard = init_tracing(settings.logging.level, log_dir.as_deref())
        .context("Cannot set up logging")?;

    tracing::info!(
        "foldq {} starting in {}",
        foldq_core::version(),
        run_dir.display()
    );

    Ok((worker, guard))
}
