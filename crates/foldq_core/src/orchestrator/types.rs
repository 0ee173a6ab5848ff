//! Core types for the orchestrator.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Settings;
use crate::jobs::{ResolvedJob, ValidationError};
use crate::logging::{ConsoleSink, LogConfig};

/// Read-only context passed to external steps.
///
/// Built per job from the settings read for that cycle.
pub struct Context<'a> {
    /// The job being run.
    pub job: &'a ResolvedJob,
    /// Settings as read at the start of the cycle.
    pub settings: &'a Settings,
    /// Interactive output.
    pub console: ConsoleSink,
    /// Per-step log file behaviour.
    pub log_config: LogConfig,
}

impl<'a> Context<'a> {
    pub fn new(
        job: &'a ResolvedJob,
        settings: &'a Settings,
        console: ConsoleSink,
        log_config: LogConfig,
    ) -> Self {
        Self {
            job,
            settings,
            console,
            log_config,
        }
    }
}

/// A fully assembled external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name for messages.
    pub fn tool_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Result of one finished external invocation.
#[derive(Debug, Clone)]
pub struct StepRun {
    /// Exit code; -1 when the child was killed by a signal.
    pub exit_code: i32,
    /// Where the invocation was logged.
    pub log_path: PathBuf,
    /// Last output lines, for failure reports.
    pub tail: Vec<String>,
}

impl StepRun {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a selected job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Descriptor failed validation; filed as failed without running.
    Rejected { reason: ValidationError },
    /// Pipeline did not succeed. `None` when it never started.
    Failed { exit_code: Option<i32> },
    /// Pipeline succeeded. `summary` is the written record, if writing it worked.
    Done { summary: Option<PathBuf> },
}

/// What one worker cycle did.
#[derive(Debug)]
pub enum Cycle {
    /// Nothing runnable was queued.
    Idle { poll_interval: Duration },
    /// One job was taken from the queue and filed.
    Processed(JobOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_displays_program_and_args() {
        let cmd = ToolCommand::new("/env/bin/python3")
            .arg("run.py")
            .args(["--a=1", "--b=2"]);
        assert_eq!(cmd.to_string(), "/env/bin/python3 run.py --a=1 --b=2");
        assert_eq!(cmd.tool_name(), "/env/bin/python3");
    }
}
