//! Job descriptor files as written by users into the queue directory.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// File extension of queue descriptors.
pub const DESCRIPTOR_EXTENSION: &str = "toml";

/// Errors reading a descriptor file.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read descriptor: {0}")]
    Read(#[from] io::Error),

    #[error("Failed to parse descriptor: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Raw content of a descriptor file.
///
/// Everything except `sequences` is optional; defaults are filled in
/// by the job builder, not here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDescriptor {
    /// Job name; the file stem is used when absent.
    pub name: Option<String>,
    /// Pipeline version id.
    pub version: Option<String>,
    /// Urgent jobs are picked before all others.
    #[serde(default)]
    pub urgent: bool,
    /// Output directory override.
    pub output_dir: Option<PathBuf>,
    /// Latest template release date, `YYYY-MM-DD`.
    pub max_template_date: Option<String>,
    pub model_preset: Option<String>,
    pub num_multimer_predictions_per_model: Option<u32>,
    pub models_to_relax: Option<String>,
    /// Container image override.
    pub docker_image: Option<String>,
    /// Named input sequences, in the order given.
    pub sequences: Option<SequenceSet>,
    /// Post-processing feature switches.
    #[serde(default)]
    pub postprocess: BTreeMap<String, bool>,
}

impl JobDescriptor {
    /// Parse descriptor text.
    pub fn parse(content: &str) -> Result<Self, DescriptorError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a descriptor file.
    pub fn read(path: &Path) -> Result<Self, DescriptorError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Post-processing options switched on, in name order.
    pub fn enabled_postprocess_flags(&self) -> Vec<String> {
        self.postprocess
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// One named input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceRecord {
    pub name: String,
    pub sequence: String,
}

impl SequenceRecord {
    /// Create a record; whitespace inside the sequence is dropped so long
    /// sequences may be wrapped over several lines in the descriptor.
    pub fn new(name: impl Into<String>, sequence: &str) -> Self {
        Self {
            name: name.into(),
            sequence: sequence.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

/// Ordered sequence records.
///
/// Accepts either a table (`[sequences]` with `name = "SEQ"` entries, in
/// document order) or a list of single-entry tables
/// (`sequences = [{ A = "MKT" }, { B = "GGG" }]`). Duplicate names are kept
/// here and rejected during validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceSet(Vec<SequenceRecord>);

impl SequenceSet {
    pub fn records(&self) -> &[SequenceRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SequenceSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SequenceSetVisitor)
    }
}

struct SequenceSetVisitor;

impl<'de> Visitor<'de> for SequenceSetVisitor {
    type Value = SequenceSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a table of name = sequence pairs or a list of single-pair tables")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SequenceSet, A::Error> {
        let mut records = Vec::new();
        while let Some((name, sequence)) = map.next_entry::<String, String>()? {
            records.push(SequenceRecord::new(name, &sequence));
        }
        Ok(SequenceSet(records))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<SequenceSet, A::Error> {
        let mut records = Vec::new();
        while let Some(entry) = seq.next_element::<BTreeMap<String, String>>()? {
            if entry.len() != 1 {
                return Err(de::Error::invalid_length(
                    entry.len(),
                    &"exactly one name = sequence pair per list entry",
                ));
            }
            records.extend(
                entry
                    .into_iter()
                    .map(|(name, sequence)| SequenceRecord::new(name, &sequence)),
            );
        }
        Ok(SequenceSet(records))
    }
}
