//! canon - backstory consistency checking against source stories
//!
//! A backstory is split into claims, each claim retrieves its top-K evidence
//! chunks from a per-story vector index, and a conservative rule cascade turns
//! the pooled evidence into a consistent/contradictory verdict with a
//! rationale.

pub mod chunking;
pub mod claims;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod evidence;
pub mod index;
pub mod pipeline;
pub mod records;
pub mod retrieval;
pub mod store;
pub mod verdict;

// Re-export commonly used types
pub use error::CanonError;
pub use evidence::{aggregate, EvidenceSet};
pub use index::StoryIndex;
pub use pipeline::{Pipeline, RunReport};
pub use records::{Backstory, Chunk, Claim, EvidenceRecord, Label, Verdict};
pub use store::{Metric, VectorStore};
pub use verdict::VerdictEngine;
