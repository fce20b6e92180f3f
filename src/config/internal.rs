//! Internal implementation for config module
//!
//! Handles canon.toml - run configuration for retrieval, verdicts and I/O.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::Metric;
use crate::verdict::{
    DEFAULT_CONTRADICTION_KEYWORDS, DEFAULT_STRONG_THRESHOLD, DEFAULT_SUPPORT_KEYWORDS,
};

// =============================================================================
// Config Types
// =============================================================================

/// Run configuration stored in canon.toml
/// All sections are optional with defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub verdict: VerdictSection,
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub claims: ClaimsSection,
    #[serde(default)]
    pub embeddings: EmbeddingsSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub run: RunSection,
}

impl RunConfig {
    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be a positive integer");
        }
        if !(-1.0..=1.0).contains(&self.verdict.strong_threshold) {
            bail!(
                "verdict.strong_threshold must be within [-1, 1], got {}",
                self.verdict.strong_threshold
            );
        }
        if self.chunking.words_per_chunk == 0 {
            bail!("chunking.words_per_chunk must be a positive integer");
        }
        if self.embeddings.dimension == 0 {
            bail!("embeddings.dimension must be a positive integer");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Evidence chunks retrieved per claim (K)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Similarity metric for the per-story vector store
    #[serde(default)]
    pub metric: Metric,
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            metric: Metric::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictSection {
    /// Minimum similarity accepted as strong support
    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f32,
    #[serde(default = "default_support_keywords")]
    pub support_keywords: Vec<String>,
    #[serde(default = "default_contradiction_keywords")]
    pub contradiction_keywords: Vec<String>,
}

fn default_strong_threshold() -> f32 {
    DEFAULT_STRONG_THRESHOLD
}
fn default_support_keywords() -> Vec<String> {
    DEFAULT_SUPPORT_KEYWORDS.iter().map(|s| s.to_string()).collect()
}
fn default_contradiction_keywords() -> Vec<String> {
    DEFAULT_CONTRADICTION_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for VerdictSection {
    fn default() -> Self {
        Self {
            strong_threshold: default_strong_threshold(),
            support_keywords: default_support_keywords(),
            contradiction_keywords: default_contradiction_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSection {
    /// Words per story window
    #[serde(default = "default_words_per_chunk")]
    pub words_per_chunk: usize,
}

fn default_words_per_chunk() -> usize {
    350
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            words_per_chunk: default_words_per_chunk(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimsSection {
    /// Claims with this many characters or fewer are discarded
    #[serde(default = "default_min_claim_chars")]
    pub min_claim_chars: usize,
}

fn default_min_claim_chars() -> usize {
    10
}

impl Default for ClaimsSection {
    fn default() -> Self {
        Self {
            min_claim_chars: default_min_claim_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Onnx,
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsSection {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Embedding model to use
    #[serde(default = "default_model")]
    pub model: String,
    /// Directory holding model.onnx / model_quantized.onnx and tokenizer.json
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_prefix: Option<String>,
    /// Expected SHA-256 (hex) of the model file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

fn default_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}
fn default_model_dir() -> String {
    "resources/models/all-minilm-l6-v2".to_string()
}
fn default_dimension() -> usize {
    384
}

impl Default for EmbeddingsSection {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: default_model(),
            model_dir: default_model_dir(),
            dimension: default_dimension(),
            query_prefix: None,
            passage_prefix: None,
            sha256: None,
        }
    }
}

impl EmbeddingsSection {
    /// Model directory with `~` and environment variables expanded
    pub fn resolved_model_dir(&self) -> PathBuf {
        let expanded = shellexpand::full(&self.model_dir)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| self.model_dir.clone());
        PathBuf::from(expanded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// Appended verdict rows (story_id,prediction,rationale)
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
    /// Per-claim retrieval audit files
    #[serde(default = "default_audit_dir")]
    pub audit_dir: PathBuf,
    /// Per-backstory claim lists
    #[serde(default = "default_claims_dir")]
    pub claims_dir: PathBuf,
    #[serde(default = "default_true")]
    pub write_audit: bool,
}

fn default_results_file() -> PathBuf {
    PathBuf::from("outputs/results.csv")
}
fn default_audit_dir() -> PathBuf {
    PathBuf::from("processed/retrieval_outputs")
}
fn default_claims_dir() -> PathBuf {
    PathBuf::from("processed/claims")
}
fn default_true() -> bool {
    true
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            results_file: default_results_file(),
            audit_dir: default_audit_dir(),
            claims_dir: default_claims_dir(),
            write_audit: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSection {
    /// Worker threads for story-level parallelism (0 = rayon default)
    #[serde(default)]
    pub threads: usize,
}

// =============================================================================
// Load/Save
// =============================================================================

/// Load run config from a TOML file
///
/// A missing file yields the defaults.
pub fn load(path: &Path) -> Result<RunConfig> {
    if !path.exists() {
        return Ok(RunConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    let config: RunConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config: {}", path.display()))?;
    Ok(config)
}
