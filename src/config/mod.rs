//! Config module - run configuration
//!
//! Manages `canon.toml`: retrieval depth and metric, verdict vocabularies and
//! threshold, chunking and claim splitting parameters, embedding backend and
//! output locations. Every section is optional.
//!
//! # Example
//!
//! ```no_run
//! use canon::config;
//! use std::path::Path;
//!
//! let config = config::load(Path::new("canon.toml"))?;
//! println!("Top-K: {}", config.retrieval.top_k);
//! # Ok::<(), anyhow::Error>(())
//! ```

mod internal;

use anyhow::Result;
use std::path::Path;

pub use internal::{
    ChunkingSection, ClaimsSection, EmbeddingBackend, EmbeddingsSection, OutputSection,
    RetrievalSection, RunConfig, RunSection, VerdictSection,
};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "canon.toml";

/// Load run config from a TOML file
///
/// Returns default config if the file doesn't exist. Invalid values are an
/// error.
pub fn load(path: &Path) -> Result<RunConfig> {
    internal::load(path)
}
