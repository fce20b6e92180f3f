//! Error taxonomy for the retrieval and verdict core
//!
//! These errors are contained per story or per claim. The pipeline turns them
//! into skipped evidence or a conservative verdict; only I/O and configuration
//! failures escape as `anyhow::Error`.

use thiserror::Error;

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CanonError>;

#[derive(Debug, Error)]
pub enum CanonError {
    /// A story referenced by a backstory has no chunks at all
    #[error("story '{story_id}' has no chunks")]
    MissingStoryChunks { story_id: String },

    /// The embedding engine failed or produced an unusable vector
    #[error("embedding failed for {target}: {reason}")]
    EmbeddingFailure { target: String, reason: String },

    /// An input row is missing a required field or has an unparsable value
    #[error("malformed {kind} record: {reason}")]
    MalformedRecord { kind: &'static str, reason: String },

    /// The story's vector store could not be constructed
    #[error("{reason}")]
    IndexBuildFailure { story_id: String, reason: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector '{id}' is empty")]
    EmptyVector { id: String },

    #[error("vector '{id}' has non-finite components")]
    NonFiniteVector { id: String },
}

impl CanonError {
    pub(crate) fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn embedding(target: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::EmbeddingFailure {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}
