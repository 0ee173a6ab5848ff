//! External step trait definition.

use super::errors::StepResult;
use super::types::{Context, ToolCommand};

/// An external tool invocation belonging to a job.
///
/// The runner calls these in order:
///
/// 1. `prepare` - create whatever the tool reads
/// 2. `command` - assemble the invocation
///
/// and then streams the child's output into `log_file_name` inside the
/// job directory.
pub trait ExternalStep {
    /// Step name (for logging and error context).
    fn name(&self) -> &str;

    /// Log file name inside the job directory.
    fn log_file_name(&self) -> &str;

    /// Whether a nonzero exit fails the job. Optional steps only warn.
    fn required(&self) -> bool {
        true
    }

    /// Set up inputs before the tool starts.
    fn prepare(&self, _ctx: &Context<'_>) -> StepResult<()> {
        Ok(())
    }

    /// The command line to run.
    fn command(&self, ctx: &Context<'_>) -> ToolCommand;
}
