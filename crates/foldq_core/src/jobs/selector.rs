//! Picks the next descriptor from the queue directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::descriptor::{DescriptorError, JobDescriptor, DESCRIPTOR_EXTENSION};
use super::lifecycle::{LifecycleError, LifecycleResult, QueueLayout};

/// A descriptor file in the queue directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// A parsed candidate chosen for processing.
#[derive(Debug, Clone)]
pub struct SelectedJob {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub descriptor: JobDescriptor,
}

impl SelectedJob {
    /// Descriptor file name without extension.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Whether a path looks like a queue descriptor.
pub fn is_descriptor(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(DESCRIPTOR_EXTENSION))
        .unwrap_or(false)
}

/// List descriptor files, oldest first.
///
/// Ties on modification time are broken by path so the order is stable.
pub fn list_candidates(queue_dir: &Path) -> io::Result<Vec<Candidate>> {
    let mut candidates = Vec::new();

    for entry in fs::read_dir(queue_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_descriptor(&path) {
            continue;
        }
        // Follows symlinks. Entries can vanish between listing and stat.
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            continue;
        }
        candidates.push(Candidate {
            path,
            modified: metadata.modified()?,
        });
    }

    candidates.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(candidates)
}

/// Whether the queue holds any descriptor at all.
pub fn has_candidates(queue_dir: &Path) -> io::Result<bool> {
    Ok(!list_candidates(queue_dir)?.is_empty())
}

/// Choose among parsed candidates (given oldest first).
///
/// The oldest urgent job wins; without urgent jobs, the oldest job.
pub fn pick_next(parsed: Vec<SelectedJob>) -> Option<SelectedJob> {
    match parsed.iter().position(|job| job.descriptor.urgent) {
        Some(index) => parsed.into_iter().nth(index),
        None => parsed.into_iter().next(),
    }
}

/// Selects the next job, filing unparseable descriptors on the way.
pub struct JobSelector<'a> {
    layout: &'a QueueLayout,
}

impl<'a> JobSelector<'a> {
    pub fn new(layout: &'a QueueLayout) -> Self {
        Self { layout }
    }

    /// Scan the queue and return the job to run next, if any.
    ///
    /// Every candidate is parsed; ones that fail are moved to the failed
    /// directory right away and never returned. An error here means the
    /// queue itself could not be read or a descriptor could not be moved.
    pub fn next_job(&self) -> LifecycleResult<Option<SelectedJob>> {
        let queue_dir = self.layout.queue_dir();
        let candidates = list_candidates(&queue_dir).map_err(|e| LifecycleError::Io {
            operation: format!("scanning {}", queue_dir.display()),
            source: e,
        })?;

        let mut parsed = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match JobDescriptor::read(&candidate.path) {
                Ok(descriptor) => parsed.push(SelectedJob {
                    path: candidate.path,
                    modified: candidate.modified,
                    descriptor,
                }),
                Err(DescriptorError::Read(e)) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("{} disappeared before it was read", candidate.path.display());
                }
                Err(e) => {
                    tracing::warn!(
                        "The file »{}« could not be parsed ({}). Skipping.",
                        candidate.path.display(),
                        e
                    );
                    self.layout.move_to_failed(&candidate.path)?;
                }
            }
        }

        Ok(pick_next(parsed))
    }
}
