//! Post-process step: runs the optional analysis tool on a finished job.

use std::ffi::OsString;

use crate::config::PostProcessSettings;
use crate::orchestrator::step::ExternalStep;
use crate::orchestrator::types::{Context, ToolCommand};

/// Log file of the post-processing run.
pub const POSTPROCESS_LOG_NAME: &str = "postprocess.log";

/// Always passed; the tool must never wait for input.
pub const NON_INTERACTIVE_FLAG: &str = "--non-interactive";

/// Runs the configured tool against the job directory.
pub struct PostProcessStep<'a> {
    tool: &'a PostProcessSettings,
}

impl<'a> PostProcessStep<'a> {
    pub fn new(tool: &'a PostProcessSettings) -> Self {
        Self { tool }
    }
}

impl ExternalStep for PostProcessStep<'_> {
    fn name(&self) -> &str {
        "Post-process"
    }

    fn log_file_name(&self) -> &str {
        POSTPROCESS_LOG_NAME
    }

    fn required(&self) -> bool {
        false
    }

    fn command(&self, ctx: &Context<'_>) -> ToolCommand {
        let base = match self.tool.interpreter() {
            Some(interpreter) => ToolCommand::new(interpreter).arg(&self.tool.tool),
            None => ToolCommand::new(&self.tool.tool),
        };
        base.arg(&ctx.job.job_dir)
            .args(postprocess_args(&ctx.job.postprocess_flags))
    }
}

/// `--non-interactive` followed by one `--<flag>` per enabled option.
pub fn postprocess_args(flags: &[String]) -> Vec<OsString> {
    std::iter::once(OsString::from(NON_INTERACTIVE_FLAG))
        .chain(flags.iter().map(|f| OsString::from(format!("--{}", f))))
        .collect()
}
