//! Resolved job types.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::descriptor::SequenceRecord;
use super::lifecycle::JobState;

/// Optional pipeline parameters.
///
/// Each is handed to the pipeline only when set; nothing here has a
/// default value of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_multimer_predictions_per_model: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_to_relax: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_image: Option<String>,
}

/// A job with every default applied and every path expanded.
///
/// Built fresh for each selected descriptor and dropped once the job is
/// filed.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedJob {
    /// Job name, also the job directory name.
    pub name: String,
    /// Pipeline version id.
    pub version: String,
    /// Where the descriptor was picked up from.
    pub descriptor: PathBuf,
    /// Input sequences in descriptor order.
    pub sequences: Vec<SequenceRecord>,
    /// Parent of the job directory; handed to the pipeline.
    pub output_dir: PathBuf,
    /// `output_dir/name`.
    pub job_dir: PathBuf,
    /// `job_dir/name.fasta`.
    pub input_file: PathBuf,
    /// Interpreter of the version's environment.
    pub interpreter: PathBuf,
    /// Pipeline entry script.
    pub pipeline_script: PathBuf,
    /// Reference database directory.
    pub data_dir: PathBuf,
    pub docker_user: String,
    /// `YYYY-MM-DD`.
    pub max_template_date: String,
    #[serde(flatten)]
    pub options: PipelineOptions,
    /// Post-processing switches to pass, without leading dashes.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub postprocess_flags: Vec<String>,
    /// When the job was resolved; start of the measured duration.
    pub started_at: DateTime<Local>,
}

/// Audit record written into the job directory when a job finishes.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary<'a> {
    #[serde(flatten)]
    pub job: &'a ResolvedJob,
    pub status: JobState,
    /// Where the descriptor rests after filing; `descriptor` is its queue path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filed_descriptor: Option<PathBuf>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postprocess_exit_code: Option<i32>,
    pub finished_at: DateTime<Local>,
    pub duration_secs: f64,
}

impl<'a> JobSummary<'a> {
    /// Summarize `job`, finished now.
    pub fn finished(job: &'a ResolvedJob, status: JobState, exit_code: i32) -> Self {
        Self::finished_at(job, status, exit_code, Local::now())
    }

    pub fn finished_at(
        job: &'a ResolvedJob,
        status: JobState,
        exit_code: i32,
        finished_at: DateTime<Local>,
    ) -> Self {
        let duration = finished_at.signed_duration_since(job.started_at);
        Self {
            job,
            status,
            filed_descriptor: None,
            exit_code,
            postprocess_exit_code: None,
            finished_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        }
    }

    pub fn with_filed_descriptor(mut self, path: PathBuf) -> Self {
        self.filed_descriptor = Some(path);
        self
    }

    pub fn with_postprocess_exit_code(mut self, code: Option<i32>) -> Self {
        self.postprocess_exit_code = code;
        self
    }
}
