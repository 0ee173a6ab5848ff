//! The worker loop.
//!
//! One job at a time: select, validate, resolve, run, file. Settings are
//! read again at the start of every cycle, so edits to `settings.toml`
//! apply from the next job on.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::config::{ConfigManager, Settings};
use crate::jobs::{
    has_candidates, write_summary, JobBuilder, JobState, JobSelector, JobSummary, JobValidator,
    QueueLayout, ResolvedJob, SelectedJob, ValidationError,
};
use crate::logging::{ConsoleSink, LogConfig};

use super::errors::{StepError, WorkerError, WorkerResult};
use super::runner::run_step;
use super::steps::{PostProcessStep, PredictStep};
use super::types::{Context, Cycle, JobOutcome};

/// Processes the queue of one run directory.
pub struct Worker {
    layout: QueueLayout,
    console: ConsoleSink,
    log_config: LogConfig,
}

impl Worker {
    pub fn new(run_dir: impl Into<PathBuf>, console: ConsoleSink) -> Self {
        Self {
            layout: QueueLayout::new(run_dir),
            console,
            log_config: LogConfig::default(),
        }
    }

    /// Override how per-step logs are written.
    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    /// Read and validate `settings.toml` of the run directory.
    pub fn load_settings(&self) -> WorkerResult<Settings> {
        Ok(ConfigManager::load_validated(self.layout.settings_path())?)
    }

    /// Fail unless the queue directory exists.
    pub fn check_queue(&self) -> WorkerResult<()> {
        let queue_dir = self.layout.queue_dir();
        if queue_dir.is_dir() {
            Ok(())
        } else {
            Err(WorkerError::QueueMissing(queue_dir))
        }
    }

    /// Run until an unrecoverable error occurs.
    pub fn run(&self) -> WorkerResult<()> {
        self.check_queue()?;
        tracing::info!("Watching »{}« for jobs", self.layout.queue_dir().display());

        let mut idle = false;
        loop {
            match self.run_once()? {
                Cycle::Idle { poll_interval } => {
                    if !idle {
                        tracing::info!("Queue is empty, waiting for jobs");
                        idle = true;
                    }
                    self.wait_for_jobs(poll_interval)?;
                }
                Cycle::Processed(outcome) => {
                    idle = false;
                    tracing::debug!("Cycle finished: {:?}", outcome);
                }
            }
        }
    }

    /// One selection cycle: pick at most one job and carry it to a
    /// terminal directory.
    pub fn run_once(&self) -> WorkerResult<Cycle> {
        self.check_queue()?;
        let settings = self.load_settings()?;

        let Some(selected) = JobSelector::new(&self.layout).next_job()? else {
            return Ok(Cycle::Idle {
                poll_interval: settings.worker.poll_interval(),
            });
        };

        let outcome = self.process(&settings, selected)?;
        Ok(Cycle::Processed(outcome))
    }

    /// Block until the queue holds a descriptor, checking every `poll_interval`.
    pub fn wait_for_jobs(&self, poll_interval: Duration) -> WorkerResult<()> {
        let queue_dir = self.layout.queue_dir();
        loop {
            let found = has_candidates(&queue_dir).map_err(|e| WorkerError::Io {
                operation: format!("scanning {}", queue_dir.display()),
                source: e,
            })?;
            if found {
                return Ok(());
            }
            thread::sleep(poll_interval);
        }
    }

    fn process(&self, settings: &Settings, selected: SelectedJob) -> WorkerResult<JobOutcome> {
        tracing::info!("Picked up »{}«", selected.path.display());

        let job = match JobValidator::new(settings)
            .validate(&selected.descriptor)
            .and_then(|()| JobBuilder::new(settings, &self.layout).build(&selected))
        {
            Ok(job) => job,
            Err(reason) => return self.reject(&selected.path, reason),
        };

        tracing::info!(
            "Running job »{}« with version »{}« into »{}«",
            job.name,
            job.version,
            job.job_dir.display()
        );

        let ctx = Context::new(&job, settings, self.console.clone(), self.log_config.clone());
        let run = match run_step(&ctx, &PredictStep) {
            Ok(run) => run,
            Err(e) => return self.fail(&job, None, Some(e)),
        };

        if !run.succeeded() {
            tracing::error!(
                "Pipeline for »{}« exited with code {}; log: {}",
                job.name,
                run.exit_code,
                run.log_path.display()
            );
            for line in &run.tail {
                tracing::error!("  {}", line);
            }
            return self.fail(&job, Some(run.exit_code), None);
        }

        let postprocess_exit_code = self.postprocess(&ctx);

        let filed = self.layout.move_to_done(&job.descriptor)?;
        let summary = JobSummary::finished(&job, JobState::Done, run.exit_code)
            .with_filed_descriptor(filed)
            .with_postprocess_exit_code(postprocess_exit_code);
        let summary = match write_summary(&job, &summary) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Job »{}« finished but its summary was not written: {}", job.name, e);
                None
            }
        };

        tracing::info!("Job »{}« is done", job.name);
        Ok(JobOutcome::Done { summary })
    }

    fn reject(&self, descriptor: &Path, reason: ValidationError) -> WorkerResult<JobOutcome> {
        tracing::warn!(
            "The job »{}« is invalid ({}). Skipping.",
            descriptor.display(),
            reason
        );
        self.layout.move_to_failed(descriptor)?;
        Ok(JobOutcome::Rejected { reason })
    }

    fn fail(
        &self,
        job: &ResolvedJob,
        exit_code: Option<i32>,
        error: Option<StepError>,
    ) -> WorkerResult<JobOutcome> {
        if let Some(e) = error {
            tracing::error!("Job »{}« could not run: {}", job.name, e);
        }
        self.layout.move_to_failed(&job.descriptor)?;
        Ok(JobOutcome::Failed { exit_code })
    }

    /// Run the post-processor if configured. Its result never affects the job.
    fn postprocess(&self, ctx: &Context<'_>) -> Option<i32> {
        let tool = ctx.settings.postprocess.as_ref()?;

        match run_step(ctx, &PostProcessStep::new(tool)) {
            Ok(run) => {
                if !run.succeeded() {
                    tracing::warn!(
                        "Post-processing of »{}« exited with code {}; log: {}",
                        ctx.job.name,
                        run.exit_code,
                        run.log_path.display()
                    );
                }
                Some(run.exit_code)
            }
            Err(e) => {
                tracing::warn!("Post-processing of »{}« could not run: {}", ctx.job.name, e);
                None
            }
        }
    }
}
