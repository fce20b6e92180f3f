//! Stub embedder - deterministic hashed bag-of-words vectors
//!
//! Each lowercase word is hashed (SHA-256) to a bucket and a sign, the signed
//! counts are summed and the result is L2 normalized. Texts that share words
//! land close together, which is enough for offline runs and tests without a
//! downloaded model.

use super::{normalize, EmbeddingEngine};
use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

pub const STUB_DIMS: usize = 256;

pub struct StubEmbedder {
    dims: usize,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self::with_dims(STUB_DIMS)
    }

    /// Create a stub embedder with custom dimensions
    pub fn with_dims(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let hash = Sha256::digest(token.as_bytes());
        let index = u64::from_le_bytes([
            hash[0], hash[1], hash[2], hash[3], hash[4], hash[5], hash[6], hash[7],
        ]);
        let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
        ((index % self.dims as u64) as usize, sign)
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingEngine for StubEmbedder {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dims];
        let mut tokens = 0usize;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (index, sign) = self.bucket(&token.to_lowercase());
            embedding[index] += sign;
            tokens += 1;
        }

        if tokens == 0 {
            bail!("Text has no tokens to embed");
        }

        let normalized = normalize(&embedding);
        if normalized.iter().all(|&x| x == 0.0) {
            // Opposite-signed tokens cancelled out completely
            bail!("Text embedded to a zero vector");
        }
        Ok(normalized)
    }

    fn dimension(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "stub-hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::cosine_similarity;
    use approx::assert_relative_eq;

    #[test]
    fn test_stub_embed_length_and_norm() {
        let mut model = StubEmbedder::new();
        let embedding = model.embed("The lighthouse keeper's daughter").unwrap();
        assert_eq!(embedding.len(), STUB_DIMS);

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_stub_deterministic() {
        let mut model = StubEmbedder::new();
        let emb1 = model.embed("hello world").unwrap();
        let emb2 = model.embed("hello world").unwrap();
        assert_eq!(emb1, emb2);
    }

    #[test]
    fn test_stub_case_insensitive() {
        let mut model = StubEmbedder::new();
        assert_eq!(model.embed("Hello World").unwrap(), model.embed("hello world").unwrap());
    }

    #[test]
    fn test_stub_word_overlap_increases_similarity() {
        let mut model = StubEmbedder::new();
        let claim = model.embed("her parents died when she was young").unwrap();
        let close = model.embed("she grew up alone after her parents died young").unwrap();
        let far = model.embed("the harbour froze over in january").unwrap();

        assert!(cosine_similarity(&claim, &close) > cosine_similarity(&claim, &far));
    }

    #[test]
    fn test_stub_rejects_empty_text() {
        let mut model = StubEmbedder::new();
        assert!(model.embed("").is_err());
        assert!(model.embed("  ... !! ").is_err());
    }
}
