//! Typed records flowing through the pipeline
//!
//! Every record is validated at construction so malformed rows are rejected at
//! the input boundary instead of deep inside aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CanonError, Result};

/// A fixed-size word window of one story's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub story_id: String,
    /// Unique within the story, conventionally `<story_id>_chunk<n>`
    pub chunk_id: String,
    /// 1-based position of the window in the story
    pub chunk_number: u32,
    pub text: String,
}

impl Chunk {
    pub fn new(
        story_id: impl Into<String>,
        chunk_id: impl Into<String>,
        chunk_number: u32,
        text: impl Into<String>,
    ) -> Result<Self> {
        let story_id = required("chunk", "story_id", story_id.into())?;
        let chunk_id = required("chunk", "chunk_id", chunk_id.into())?;
        if chunk_number == 0 {
            return Err(CanonError::malformed(
                "chunk",
                format!("chunk_number for '{}' must start at 1", chunk_id),
            ));
        }

        Ok(Self {
            story_id,
            chunk_id,
            chunk_number,
            text: text.into(),
        })
    }

    /// Canonical chunk id for a story and window number
    pub fn make_id(story_id: &str, chunk_number: u32) -> String {
        format!("{}_chunk{}", story_id, chunk_number)
    }
}

/// An atomic statement extracted from a backstory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub story_id: String,
    /// 1-based, sequential per backstory
    pub claim_id: u32,
    pub text: String,
}

impl Claim {
    pub fn new(story_id: impl Into<String>, claim_id: u32, text: impl Into<String>) -> Result<Self> {
        let story_id = required("claim", "story_id", story_id.into())?;
        if claim_id == 0 {
            return Err(CanonError::malformed("claim", "claim_id must start at 1"));
        }
        Ok(Self {
            story_id,
            claim_id,
            text: text.into(),
        })
    }
}

/// A character backstory to be checked against its story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backstory {
    pub story_id: String,
    pub content: String,
}

impl Backstory {
    pub fn new(story_id: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            story_id: required("backstory", "story_id", story_id.into())?,
            content: content.into(),
        })
    }
}

/// One retrieved chunk for one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub claim_id: u32,
    pub story_id: String,
    pub chunk_id: String,
    pub chunk_number: u32,
    /// Cosine-scale similarity in [-1, 1], verbatim from the vector store
    pub similarity: f32,
    pub text: String,
}

/// Binary consistency label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Contradictory,
    Consistent,
}

impl Label {
    /// Numeric form used in the results file (1 = consistent)
    pub fn as_u8(self) -> u8 {
        match self {
            Label::Contradictory => 0,
            Label::Consistent => 1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Final decision for one backstory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub story_id: String,
    pub label: Label,
    pub rationale: String,
}

impl Verdict {
    pub fn new(story_id: impl Into<String>, label: Label, rationale: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            label,
            rationale: rationale.into(),
        }
    }
}

/// Why an input row was dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipReason {
    /// Input the row came from (file name or record kind)
    pub source: String,
    /// 1-based record number within the source, header excluded
    pub record: usize,
    pub reason: String,
}

fn required(kind: &'static str, field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CanonError::malformed(kind, format!("missing {}", field)));
    }
    if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_string())
    }
}
