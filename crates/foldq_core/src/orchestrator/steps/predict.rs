//! Predict step: writes the input file and runs the prediction pipeline.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::jobs::{ResolvedJob, SequenceRecord};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::ExternalStep;
use crate::orchestrator::types::{Context, ToolCommand};

/// Log file of the pipeline run.
pub const PIPELINE_LOG_NAME: &str = "pipeline.log";

/// Runs the version's entry script under its interpreter.
pub struct PredictStep;

impl ExternalStep for PredictStep {
    fn name(&self) -> &str {
        "Predict"
    }

    fn log_file_name(&self) -> &str {
        PIPELINE_LOG_NAME
    }

    fn prepare(&self, ctx: &Context<'_>) -> StepResult<()> {
        write_input_file(ctx.job)
    }

    fn command(&self, ctx: &Context<'_>) -> ToolCommand {
        ToolCommand::new(&ctx.job.interpreter)
            .arg(&ctx.job.pipeline_script)
            .args(pipeline_args(ctx.job))
    }
}

/// Records as `>name` header plus sequence line, in the given order.
pub fn render_fasta(records: &[SequenceRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push('>');
        out.push_str(&record.name);
        out.push('\n');
        out.push_str(&record.sequence);
        out.push('\n');
    }
    out
}

/// Create the job directory and write the pipeline input into it.
pub fn write_input_file(job: &ResolvedJob) -> StepResult<()> {
    fs::create_dir_all(&job.job_dir)
        .map_err(|e| StepError::io(format!("creating {}", job.job_dir.display()), e))?;
    fs::write(&job.input_file, render_fasta(&job.sequences))
        .map_err(|e| StepError::io(format!("writing {}", job.input_file.display()), e))?;
    tracing::debug!(
        "Wrote {} sequence(s) to {}",
        job.sequences.len(),
        job.input_file.display()
    );
    Ok(())
}

/// Pipeline arguments after the entry script.
///
/// The fixed set always comes first in this order, then whichever optional
/// parameters are present, also in a fixed order.
pub fn pipeline_args(job: &ResolvedJob) -> Vec<OsString> {
    let mut args = vec![
        flag("max_template_date", &job.max_template_date),
        path_flag("data_dir", &job.data_dir),
        flag("docker_user", &job.docker_user),
        path_flag("output_dir", &job.output_dir),
        path_flag("fasta_paths", &job.input_file),
    ];

    let options = &job.options;
    if let Some(preset) = &options.model_preset {
        args.push(flag("model_preset", preset));
    }
    if let Some(count) = options.num_multimer_predictions_per_model {
        args.push(flag("num_multimer_predictions_per_model", &count.to_string()));
    }
    if let Some(relax) = &options.models_to_relax {
        args.push(flag("models_to_relax", relax));
    }
    if let Some(image) = &options.docker_image {
        args.push(flag("docker_image_name", image));
    }

    args
}

fn flag(key: &str, value: &str) -> OsString {
    format!("--{}={}", key, value).into()
}

fn path_flag(key: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(format!("--{}=", key));
    arg.push(path.as_os_str());
    arg
}
