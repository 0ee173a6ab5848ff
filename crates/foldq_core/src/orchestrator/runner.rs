//! Runs an external step and streams its output.
//!
//! stdout and stderr are read on two helper threads and funneled through
//! one channel, so lines reach the log in arrival order. Each line is
//! written (and flushed) before the next one is taken.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use crate::logging::JobLogger;

use super::errors::{StepError, StepResult};
use super::step::ExternalStep;
use super::types::{Context, StepRun, ToolCommand};

/// Exit code reported when the child ended without one (killed by a signal).
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Prepare, run and log one external step of `ctx.job`.
///
/// Blocks until the child exits; there is no timeout. A nonzero exit is
/// not an error here, it is returned in `StepRun::exit_code`.
pub fn run_step(ctx: &Context<'_>, step: &dyn ExternalStep) -> StepResult<StepRun> {
    step.prepare(ctx)?;

    let log_path = ctx.job.job_dir.join(step.log_file_name());
    let logger = JobLogger::new(&log_path, ctx.log_config.clone(), ctx.console.clone())
        .map_err(|e| StepError::Log {
            path: log_path.clone(),
            source: e,
        })?;

    let command = step.command(ctx);
    logger.phase(step.name());
    logger.command(&command.to_string());
    tracing::debug!("Running {}: {}", step.name(), command);

    let exit_code = match stream_command(&command, &logger) {
        Ok(code) => code,
        Err(e) => {
            logger.error(&e.to_string());
            return Err(e);
        }
    };

    let message = format!("{} exited with code {}", step.name(), exit_code);
    if exit_code == 0 {
        logger.success(&format!("{} finished", step.name()));
    } else if step.required() {
        logger.error(&message);
    } else {
        logger.warn(&message);
    }

    let tail = logger.get_tail();
    logger.close();

    Ok(StepRun {
        exit_code,
        log_path,
        tail,
    })
}

/// Spawn `command`, forward every output line to `logger`, return the exit code.
fn stream_command(command: &ToolCommand, logger: &JobLogger) -> StepResult<i32> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| StepError::spawn(command.tool_name(), e))?;

    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_line_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_line_reader(stderr, tx.clone()));
    }
    drop(tx);

    // Ends once both pipes are closed.
    for line in rx {
        logger.output_line(&line);
    }
    for reader in readers {
        if reader.join().is_err() {
            tracing::warn!("Output reader for {} panicked", command.tool_name());
        }
    }

    let status = child
        .wait()
        .map_err(|e| StepError::io(format!("waiting for {}", command.tool_name()), e))?;

    Ok(status.code().unwrap_or(SIGNAL_EXIT_CODE))
}

/// Read `source` line by line into `tx`. Invalid UTF-8 is replaced, not fatal.
fn spawn_line_reader<R>(source: R, tx: Sender<String>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("Stopped reading tool output: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::jobs::{PipelineOptions, ResolvedJob};
    use crate::logging::LogConfig;
    use chrono::Local;
    use parking_lot::Mutex;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Runs `/bin/sh -c <script>`.
    struct ShellStep {
        script: String,
        required: bool,
    }

    impl ExternalStep for ShellStep {
        fn name(&self) -> &str {
            "Shell"
        }

        fn log_file_name(&self) -> &str {
            "shell.log"
        }

        fn required(&self) -> bool {
            self.required
        }

        fn command(&self, _ctx: &Context<'_>) -> ToolCommand {
            ToolCommand::new("/bin/sh").arg("-c").arg(&self.script)
        }
    }

    fn job_in(dir: &Path) -> ResolvedJob {
        let job_dir = dir.join("job");
        ResolvedJob {
            name: "job".to_string(),
            version: "v1".to_string(),
            descriptor: dir.join("input/job.toml"),
            sequences: Vec::new(),
            output_dir: dir.to_path_buf(),
            input_file: job_dir.join("job.fasta"),
            job_dir,
            interpreter: PathBuf::from("/bin/sh"),
            pipeline_script: PathBuf::from("run.sh"),
            data_dir: dir.to_path_buf(),
            docker_user: "root".to_string(),
            max_template_date: "2024-01-01".to_string(),
            options: PipelineOptions::default(),
            postprocess_flags: Vec::new(),
            started_at: Local::now(),
        }
    }

    fn run(dir: &Path, script: &str) -> (StepResult<StepRun>, Vec<String>) {
        run_with(dir, script, true)
    }

    fn run_with(dir: &Path, script: &str, required: bool) -> (StepResult<StepRun>, Vec<String>) {
        let job = job_in(dir);
        let settings = Settings::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = Context::new(
            &job,
            &settings,
            Arc::new(move |line: &str| sink.lock().push(line.to_string())),
            LogConfig::default(),
        );
        let result = run_step(
            &ctx,
            &ShellStep {
                script: script.to_string(),
                required,
            },
        );
        let lines = seen.lock().clone();
        (result, lines)
    }

    #[test]
    fn streams_both_pipes_to_log_and_console() {
        let dir = tempdir().unwrap();
        let (result, console) = run(dir.path(), "echo out-line; echo err-line >&2; exit 0");
        let run = result.unwrap();

        assert!(run.succeeded());
        let log = fs::read_to_string(&run.log_path).unwrap();
        assert!(log.contains("out-line"));
        assert!(log.contains("err-line"));
        assert!(console.iter().any(|l| l == "out-line"));
        assert!(console.iter().any(|l| l == "err-line"));
        assert!(run.tail.contains(&"out-line".to_string()));
    }

    #[test]
    fn nonzero_exit_is_returned_verbatim() {
        let dir = tempdir().unwrap();
        let (result, _) = run(dir.path(), "echo boom; exit 7");
        let run = result.unwrap();
        assert_eq!(run.exit_code, 7);
        assert_eq!(run.tail.last().map(String::as_str), Some("boom"));
    }

    #[test]
    fn optional_step_failure_is_logged_as_warning() {
        let dir = tempdir().unwrap();
        let (result, _) = run_with(dir.path(), "exit 2", false);
        let run = result.unwrap();
        assert_eq!(run.exit_code, 2);

        let log = fs::read_to_string(&run.log_path).unwrap();
        assert!(log.contains("[WARNING] Shell exited with code 2"));
        assert!(!log.contains("[ERROR]"));

        let (result, _) = run_with(dir.path(), "exit 2", true);
        let log = fs::read_to_string(&result.unwrap().log_path).unwrap();
        assert!(log.contains("[ERROR] Shell exited with code 2"));
    }

    #[test]
    fn killed_child_reports_signal_code() {
        let dir = tempdir().unwrap();
        let (result, _) = run(dir.path(), "kill -9 $$");
        assert_eq!(result.unwrap().exit_code, SIGNAL_EXIT_CODE);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        struct Missing;
        impl ExternalStep for Missing {
            fn name(&self) -> &str {
                "Missing"
            }
            fn log_file_name(&self) -> &str {
                "missing.log"
            }
            fn command(&self, _ctx: &Context<'_>) -> ToolCommand {
                ToolCommand::new("/nonexistent/bin/python3")
            }
        }

        let dir = tempdir().unwrap();
        let job = job_in(dir.path());
        let settings = Settings::default();
        let ctx = Context::new(&job, &settings, Arc::new(|_: &str| {}), LogConfig::quiet());

        let err = run_step(&ctx, &Missing).unwrap_err();
        assert!(matches!(err, StepError::Spawn { .. }));
        let log = fs::read_to_string(dir.path().join("job/missing.log")).unwrap();
        assert!(log.contains("[ERROR]"));
    }
}
