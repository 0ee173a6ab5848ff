//! Descriptor lifecycle on disk.
//!
//! A descriptor's state is the directory it sits in:
//!
//! ```text
//! {run_dir}/input/         Queued
//! {run_dir}/failed_jobs/   Failed
//! {run_dir}/done_jobs/     Done
//! ```
//!
//! `QueueLayout::transition` is the only code that moves descriptors.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use thiserror::Error;

use super::types::{JobSummary, ResolvedJob};

/// Name of the per-job summary record.
pub const SUMMARY_FILE_NAME: &str = "job_summary.json";

/// Name of the settings file inside a run directory.
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Where a descriptor currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting in the queue directory.
    Queued,
    /// Rejected or the pipeline failed.
    Failed,
    /// The pipeline succeeded.
    Done,
}

impl JobState {
    /// Directory name under the run directory.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Queued => "input",
            Self::Failed => "failed_jobs",
            Self::Done => "done_jobs",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Failed => "failed",
            Self::Done => "done",
        }
    }

    /// Whether a descriptor may move from `self` to `to`.
    pub fn can_transition_to(&self, to: JobState) -> bool {
        matches!(
            (self, to),
            (Self::Queued, Self::Failed) | (Self::Queued, Self::Done)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors moving descriptors or writing records.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot move a descriptor from {from} to {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Descriptor '{}' is not in the {state} directory", path.display())]
    NotInState { path: PathBuf, state: JobState },

    #[error("Failed to serialize job summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl LifecycleError {
    fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Directory layout of a run directory.
#[derive(Debug, Clone)]
pub struct QueueLayout {
    run_dir: PathBuf,
}

impl QueueLayout {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Directory holding descriptors in `state`.
    pub fn dir_for(&self, state: JobState) -> PathBuf {
        self.run_dir.join(state.dir_name())
    }

    /// The queue directory.
    pub fn queue_dir(&self) -> PathBuf {
        self.dir_for(JobState::Queued)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.run_dir.join(SETTINGS_FILE_NAME)
    }

    /// Directory for the worker's own rolling log.
    pub fn logs_dir(&self) -> PathBuf {
        self.run_dir.join("logs")
    }

    /// Fallback output directory when neither descriptor nor settings name one.
    pub fn default_output_dir(&self) -> PathBuf {
        self.run_dir.join("results")
    }

    /// Move a descriptor between state directories.
    ///
    /// The target directory is created on first use. The move is a single
    /// rename; if a descriptor with the same file name already rests in the
    /// target, the moved file gets a timestamp suffix instead of replacing it.
    /// Returns the descriptor's new path.
    pub fn transition(
        &self,
        descriptor: &Path,
        from: JobState,
        to: JobState,
    ) -> LifecycleResult<PathBuf> {
        if !from.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition { from, to });
        }

        let from_dir = self.dir_for(from);
        let file_name = match descriptor.file_name() {
            Some(name) if descriptor.parent() == Some(from_dir.as_path()) => name,
            _ => {
                return Err(LifecycleError::NotInState {
                    path: descriptor.to_path_buf(),
                    state: from,
                })
            }
        };

        let target_dir = self.dir_for(to);
        fs::create_dir_all(&target_dir).map_err(|e| {
            LifecycleError::io(format!("creating {}", target_dir.display()), e)
        })?;

        let mut target = target_dir.join(file_name);
        if target.exists() {
            target = target_dir.join(suffixed_name(descriptor));
        }

        fs::rename(descriptor, &target).map_err(|e| {
            LifecycleError::io(format!("moving {}", descriptor.display()), e)
        })?;

        tracing::info!("Moved job to »{}«", target_dir.display());
        Ok(target)
    }

    /// Route a queued descriptor to the failed directory.
    pub fn move_to_failed(&self, descriptor: &Path) -> LifecycleResult<PathBuf> {
        self.transition(descriptor, JobState::Queued, JobState::Failed)
    }

    /// Route a queued descriptor to the done directory.
    pub fn move_to_done(&self, descriptor: &Path) -> LifecycleResult<PathBuf> {
        self.transition(descriptor, JobState::Queued, JobState::Done)
    }
}

/// `stem.YYYYmmdd-HHMMSS.ext` for a descriptor that would collide.
fn suffixed_name(descriptor: &Path) -> String {
    let stem = descriptor
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    match descriptor.extension() {
        Some(ext) => format!("{}.{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.{}", stem, stamp),
    }
}

/// Write the job's summary record into its job directory.
///
/// Written once, after the descriptor reached its terminal directory.
/// Uses a temp file plus rename so a reader never sees half a record.
pub fn write_summary(job: &ResolvedJob, summary: &JobSummary<'_>) -> LifecycleResult<PathBuf> {
    let path = job.job_dir.join(SUMMARY_FILE_NAME);
    let json = serde_json::to_string_pretty(summary)?;

    atomic_write(&path, json.as_bytes())
        .map_err(|e| LifecycleError::io(format!("writing {}", path.display()), e))?;

    tracing::debug!("Wrote job summary to {}", path.display());
    Ok(path)
}

fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn queued(layout: &QueueLayout, name: &str) -> PathBuf {
        fs::create_dir_all(layout.queue_dir()).unwrap();
        let path = layout.queue_dir().join(name);
        fs::write(&path, "[sequences]\nA = \"MKT\"\n").unwrap();
        path
    }

    #[test]
    fn move_to_failed_creates_directory_lazily() {
        let dir = tempdir().unwrap();
        let layout = QueueLayout::new(dir.path());
        let descriptor = queued(&layout, "job.toml");
        assert!(!layout.dir_for(JobState::Failed).exists());

        let moved = layout.move_to_failed(&descriptor).unwrap();

        assert_eq!(moved, dir.path().join("failed_jobs").join("job.toml"));
        assert!(moved.exists());
        assert!(!descriptor.exists());
    }

    #[test]
    fn move_to_done_leaves_exactly_one_copy() {
        let dir = tempdir().unwrap();
        let layout = QueueLayout::new(dir.path());
        let descriptor = queued(&layout, "job.toml");

        layout.move_to_done(&descriptor).unwrap();

        let count = [JobState::Queued, JobState::Failed, JobState::Done]
            .iter()
            .filter(|s| layout.dir_for(**s).join("job.toml").exists())
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn existing_terminal_descriptor_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let layout = QueueLayout::new(dir.path());

        let first = queued(&layout, "job.toml");
        let first_target = layout.move_to_done(&first).unwrap();
        let second = queued(&layout, "job.toml");
        let second_target = layout.move_to_done(&second).unwrap();

        assert_ne!(first_target, second_target);
        assert!(first_target.exists());
        assert!(second_target.exists());
        let name = second_target.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("job."));
        assert!(name.ends_with(".toml"));
    }

    #[test]
    fn only_queued_descriptors_move() {
        let dir = tempdir().unwrap();
        let layout = QueueLayout::new(dir.path());
        let descriptor = queued(&layout, "job.toml");
        let done = layout.move_to_done(&descriptor).unwrap();

        let err = layout
            .transition(&done, JobState::Done, JobState::Failed)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        // Claiming the file is still queued does not help either.
        let err = layout.move_to_failed(&done).unwrap_err();
        assert!(matches!(err, LifecycleError::NotInState { .. }));
        assert!(done.exists());
    }

    #[test]
    fn transition_table() {
        use JobState::*;
        assert!(Queued.can_transition_to(Failed));
        assert!(Queued.can_transition_to(Done));
        assert!(!Queued.can_transition_to(Queued));
        assert!(!Failed.can_transition_to(Queued));
        assert!(!Done.can_transition_to(Failed));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SUMMARY_FILE_NAME);

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
