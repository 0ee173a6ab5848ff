//! Schema checks on parsed descriptors.

use std::collections::HashSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::Settings;

use super::descriptor::JobDescriptor;

/// Date format of `max_template_date`.
pub const TEMPLATE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a descriptor cannot run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no »sequences« given; they are mandatory")]
    MissingSequences,

    #[error("»sequences« is empty")]
    EmptySequences,

    #[error("sequence »{name}« is empty")]
    EmptySequence { name: String },

    #[error("sequence name »{name}« is not usable as a record header")]
    InvalidSequenceName { name: String },

    #[error("sequence name »{name}« appears more than once")]
    DuplicateSequenceName { name: String },

    #[error("version »{version}« is not included in the settings")]
    UnknownVersion { version: String },

    #[error("job name »{name}« cannot be used as a directory name")]
    InvalidName { name: String },

    #[error("max_template_date »{value}« is not a YYYY-MM-DD date")]
    InvalidTemplateDate { value: String },
}

/// Result type for validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks a descriptor against the schema and the current settings.
pub struct JobValidator<'a> {
    settings: &'a Settings,
}

impl<'a> JobValidator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Validate a parsed descriptor.
    ///
    /// Stops at the first problem; there is no partial acceptance.
    pub fn validate(&self, descriptor: &JobDescriptor) -> ValidationResult<()> {
        if let Some(version) = &descriptor.version {
            if self.settings.version(version).is_none() {
                return Err(ValidationError::UnknownVersion {
                    version: version.clone(),
                });
            }
        }

        let sequences = descriptor
            .sequences
            .as_ref()
            .ok_or(ValidationError::MissingSequences)?;
        if sequences.is_empty() {
            return Err(ValidationError::EmptySequences);
        }

        let mut seen = HashSet::new();
        for record in sequences.records() {
            if record.name.trim().is_empty() || record.name.contains(['\n', '\r']) {
                return Err(ValidationError::InvalidSequenceName {
                    name: record.name.clone(),
                });
            }
            if record.sequence.is_empty() {
                return Err(ValidationError::EmptySequence {
                    name: record.name.clone(),
                });
            }
            if !seen.insert(record.name.as_str()) {
                return Err(ValidationError::DuplicateSequenceName {
                    name: record.name.clone(),
                });
            }
        }

        if let Some(name) = &descriptor.name {
            if !is_path_component(name) {
                return Err(ValidationError::InvalidName { name: name.clone() });
            }
        }

        if let Some(date) = &descriptor.max_template_date {
            if NaiveDate::parse_from_str(date, TEMPLATE_DATE_FORMAT).is_err() {
                return Err(ValidationError::InvalidTemplateDate {
                    value: date.clone(),
                });
            }
        }

        Ok(())
    }
}

/// A single, non-special path component.
pub(crate) fn is_path_component(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
