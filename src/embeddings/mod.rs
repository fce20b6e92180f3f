//! Embeddings module - turn chunk and claim text into dense vectors
//!
//! Provides trait-based abstraction for embedding generation with two backends:
//! an ONNX sentence-transformer and a deterministic hashing stub for offline
//! runs. The rest of the crate only sees `EmbeddingEngine`.

mod onnx;
mod similarity;
mod stub;

pub use onnx::OnnxEmbedder;
pub use similarity::{l2_to_cosine_scale, normalize, squared_distance};

#[cfg(test)]
pub(crate) use similarity::cosine_similarity;
pub use stub::StubEmbedder;

use anyhow::Result;

use crate::config::{EmbeddingBackend, EmbeddingsSection};

/// Trait for embedding generation engines
///
/// Requires Send so one engine can be shared behind a mutex by the story
/// workers in the rayon pool.
pub trait EmbeddingEngine: Send {
    /// Generate embedding for a single text
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding for a claim (with model-specific prefix if needed)
    ///
    /// For asymmetric models (e.g., BGE, E5), this applies query-specific formatting.
    /// For symmetric models (e.g., all-MiniLM), this is identical to embed().
    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    /// Generate embedding for a story chunk (with model-specific prefix if needed)
    fn embed_passage(&mut self, text: &str) -> Result<Vec<f32>> {
        self.embed(text)
    }

    /// Generate passage embeddings for multiple texts, one vector per input
    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_passage(t)).collect()
    }

    /// Get embedding dimension (e.g., 384 for all-MiniLM-L6-v2)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

impl<E: EmbeddingEngine + ?Sized> EmbeddingEngine for Box<E> {
    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        (**self).embed_query(text)
    }

    fn embed_passage(&mut self, text: &str) -> Result<Vec<f32>> {
        (**self).embed_passage(text)
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Create the embedder selected by the `[embeddings]` config section
pub fn create_embedder(section: &EmbeddingsSection) -> Result<Box<dyn EmbeddingEngine>> {
    match section.backend {
        EmbeddingBackend::Onnx => {
            let embedder = OnnxEmbedder::from_section(section)?;
            tracing::info!(
                "Loaded ONNX embedder {} ({} dims)",
                embedder.model_name(),
                embedder.dimension()
            );
            Ok(Box::new(embedder))
        }
        EmbeddingBackend::Stub => {
            tracing::info!("Using stub embedder ({} dims)", section.dimension);
            Ok(Box::new(StubEmbedder::with_dims(section.dimension)))
        }
    }
}
