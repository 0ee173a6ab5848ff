//! Queue descriptors and the job lifecycle.
//!
//! This module provides:
//! - `JobDescriptor`: the raw descriptor file a user drops into `input/`
//! - `JobSelector`: picks the next descriptor (urgent first, then oldest)
//! - `JobValidator`: schema checks against the current settings
//! - `JobBuilder`: defaults and path expansion into a `ResolvedJob`
//! - `QueueLayout`: the run directory and the only place descriptors move

mod builder;
mod descriptor;
mod lifecycle;
mod selector;
mod types;
mod validation;

pub use builder::{JobBuilder, INPUT_EXTENSION};
pub use descriptor::{
    DescriptorError, JobDescriptor, SequenceRecord, SequenceSet, DESCRIPTOR_EXTENSION,
};
pub use lifecycle::{
    write_summary, JobState, LifecycleError, LifecycleResult, QueueLayout, SETTINGS_FILE_NAME,
    SUMMARY_FILE_NAME,
};
pub use selector::{
    has_candidates, is_descriptor, list_candidates, pick_next, Candidate, JobSelector,
    SelectedJob,
};
pub use types::{JobSummary, PipelineOptions, ResolvedJob};
pub use validation::{JobValidator, ValidationError, ValidationResult, TEMPLATE_DATE_FORMAT};
