//! ONNX Runtime embedder for sentence-transformer models (all-MiniLM-L6-v2 by default)

use super::{normalize, EmbeddingEngine};
use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use ort::{inputs, session::Session, value::Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use crate::config::EmbeddingsSection;

/// Token limit shared by MiniLM, BGE and E5 exports
const MAX_TOKENS: usize = 512;

/// Texts per inference call; bounds peak memory for long story chunks
const BATCH_SIZE: usize = 32;

/// ONNX-based embedding generator
pub struct OnnxEmbedder {
    session: Session,
    tokenizer: Tokenizer,
    dimension: usize,
    model_name: String,
    query_prefix: Option<String>,
    passage_prefix: Option<String>,
}

impl OnnxEmbedder {
    /// Create an embedder from the `[embeddings]` config section
    ///
    /// Looks for `model_quantized.onnx` first, then `model.onnx`, next to a
    /// `tokenizer.json` inside `model_dir`. When `sha256` is configured the model
    /// file must match it.
    pub fn from_section(section: &EmbeddingsSection) -> Result<Self> {
        let model_dir = section.resolved_model_dir();
        let model_path = resolve_model_file(&model_dir);
        let tokenizer_path = model_dir.join("tokenizer.json");

        if let Some(expected) = &section.sha256 {
            verify_model_digest(&model_path, expected)?;
        }

        Self::new_from_paths(
            &model_path,
            &tokenizer_path,
            &section.model,
            section.dimension,
            section.query_prefix.clone(),
            section.passage_prefix.clone(),
        )
    }

    /// Create a new ONNX embedder from custom paths
    ///
    /// # Arguments
    /// * `model_path` - Path to ONNX model file
    /// * `tokenizer_path` - Path to tokenizer.json file
    /// * `model_name` - Human-readable model name (e.g., "all-MiniLM-L6-v2")
    /// * `dimension` - Embedding dimension (384 for small models, 768 for base models)
    /// * `query_prefix` - Optional prefix for claim embeddings (asymmetric models like BGE)
    /// * `passage_prefix` - Optional prefix for chunk embeddings (asymmetric models like E5)
    pub fn new_from_paths(
        model_path: &Path,
        tokenizer_path: &Path,
        model_name: &str,
        dimension: usize,
        query_prefix: Option<String>,
        passage_prefix: Option<String>,
    ) -> Result<Self> {
        if !model_path.exists() {
            bail!(
                "ONNX model not found at: {}\n\n\
                Download it with:\n  \
                mkdir -p $(dirname {}) && \\\n  \
                curl -L -o {} \\\n  \
                https://huggingface.co/Xenova/all-MiniLM-L6-v2/resolve/main/onnx/model_quantized.onnx",
                model_path.display(),
                model_path.display(),
                model_path.display()
            );
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        if !tokenizer_path.exists() {
            bail!(
                "Tokenizer not found at: {}\n\n\
                Download it with:\n  \
                curl -L -o {} \\\n  \
                  https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json",
                tokenizer_path.display(),
                tokenizer_path.display()
            );
        }

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        // 350-word chunks routinely exceed the model's position limit
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session,
            tokenizer,
            dimension,
            model_name: model_name.to_string(),
            query_prefix,
            passage_prefix,
        })
    }

    /// Run one padded batch through the model and mean-pool each row
    fn infer(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let batch = encodings.len();
        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut input_ids = Array2::<i64>::zeros((batch, seq_len));
        let mut attention_mask = Array2::<i64>::zeros((batch, seq_len));
        for (row, encoding) in encodings.iter().enumerate() {
            for (col, (&id, &mask)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .enumerate()
            {
                input_ids[[row, col]] = id as i64;
                attention_mask[[row, col]] = mask as i64;
            }
        }
        // Token type IDs - all zeros for single-sentence embeddings
        let token_type_ids = Array2::<i64>::zeros((batch, seq_len));
        let mask_rows = attention_mask.clone();

        let (hidden_dim, data) = {
            let outputs = self
                .session
                .run(inputs![
                    "input_ids" => Value::from_array(input_ids)?,
                    "attention_mask" => Value::from_array(attention_mask)?,
                    "token_type_ids" => Value::from_array(token_type_ids)?
                ])
                .context("ONNX inference failed")?;

            let (shape, data) = outputs["last_hidden_state"]
                .try_extract_tensor::<f32>()
                .context("Failed to extract last_hidden_state tensor")?;

            // Shape is [batch_size, seq_len, hidden_dim]
            let shape_dims = shape.as_ref();
            if shape_dims.len() != 3 || shape_dims[0] as usize != batch {
                bail!("Unexpected output tensor shape: {:?}", shape_dims);
            }
            let hidden_dim = shape_dims[2] as usize;
            if shape_dims[1] as usize != seq_len {
                bail!(
                    "Output sequence length {} does not match input {}",
                    shape_dims[1],
                    seq_len
                );
            }
            (hidden_dim, data.to_vec())
        };

        if hidden_dim != self.dimension {
            bail!(
                "Model {} produced {} dims, expected {}",
                self.model_name,
                hidden_dim,
                self.dimension
            );
        }

        let mut embeddings = Vec::with_capacity(batch);
        for row in 0..batch {
            let offset = row * seq_len * hidden_dim;
            let tokens = &data[offset..offset + seq_len * hidden_dim];
            let pooled = mean_pooling(tokens, mask_rows.row(row).as_slice(), hidden_dim)?;
            embeddings.push(normalize(&pooled));
        }
        Ok(embeddings)
    }

    fn with_prefix(prefix: &Option<String>, text: &str) -> String {
        match prefix {
            Some(p) => format!("{}{}", p, text),
            None => text.to_string(),
        }
    }
}

/// Mean pooling - average token embeddings weighted by attention mask
fn mean_pooling(tokens: &[f32], mask: Option<&[i64]>, hidden_dim: usize) -> Result<Vec<f32>> {
    let mask = mask.ok_or_else(|| anyhow!("Attention mask is not contiguous"))?;
    let mask_sum: f32 = mask.iter().map(|&x| x as f32).sum();

    let mut pooled = vec![0.0; hidden_dim];
    if mask_sum == 0.0 {
        return Ok(pooled);
    }

    for (i, &m) in mask.iter().enumerate() {
        if m == 1 {
            let token = &tokens[i * hidden_dim..(i + 1) * hidden_dim];
            for (acc, &value) in pooled.iter_mut().zip(token) {
                *acc += value;
            }
        }
    }

    Ok(pooled.iter().map(|&x| x / mask_sum).collect())
}

fn resolve_model_file(model_dir: &Path) -> PathBuf {
    let quantized = model_dir.join("model_quantized.onnx");
    if quantized.exists() {
        quantized
    } else {
        model_dir.join("model.onnx")
    }
}

/// Compare the model file's SHA-256 against the configured hex digest
fn verify_model_digest(model_path: &Path, expected: &str) -> Result<()> {
    let bytes = std::fs::read(model_path)
        .with_context(|| format!("Failed to read model for digest: {}", model_path.display()))?;
    let actual: String = Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    if !actual.eq_ignore_ascii_case(expected.trim()) {
        bail!(
            "Model digest mismatch for {}: expected {}, got {}",
            model_path.display(),
            expected,
            actual
        );
    }
    Ok(())
}

impl EmbeddingEngine for OnnxEmbedder {
    fn embed_query(&mut self, text: &str) -> Result<Vec<f32>> {
        let input = Self::with_prefix(&self.query_prefix, text);
        self.embed(&input)
    }

    fn embed_passage(&mut self, text: &str) -> Result<Vec<f32>> {
        let input = Self::with_prefix(&self.passage_prefix, text);
        self.embed(&input)
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            bail!("Cannot embed empty text");
        }
        self.infer(&[text])?
            .pop()
            .ok_or_else(|| anyhow!("Model returned no embedding"))
    }

    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            bail!("Cannot embed empty text in batch");
        }

        let inputs: Vec<String> = texts
            .iter()
            .map(|t| Self::with_prefix(&self.passage_prefix, t))
            .collect();

        let mut embeddings = Vec::with_capacity(inputs.len());
        for batch in inputs.chunks(BATCH_SIZE) {
            let refs: Vec<&str> = batch.iter().map(|s| s.as_str()).collect();
            embeddings.extend(self.infer(&refs)?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn get_test_embedder() -> OnnxEmbedder {
        let model_path = Path::new("resources/models/all-minilm-l6-v2/model_quantized.onnx");
        let tokenizer_path = Path::new("resources/models/all-minilm-l6-v2/tokenizer.json");

        if !model_path.exists() || !tokenizer_path.exists() {
            panic!("Test model not found under resources/models/all-minilm-l6-v2");
        }

        OnnxEmbedder::new_from_paths(
            model_path,
            tokenizer_path,
            "all-MiniLM-L6-v2",
            384,
            None,
            None,
        )
        .expect("Test model should load")
    }

    #[test]
    fn test_mean_pooling_ignores_padding() {
        // Two tokens of dim 2, second is padding
        let tokens = [1.0, 3.0, 100.0, 100.0];
        let pooled = mean_pooling(&tokens, Some(&[1, 0]), 2).unwrap();
        assert_eq!(pooled, vec![1.0, 3.0]);
    }

    #[test]
    fn test_mean_pooling_all_masked() {
        let pooled = mean_pooling(&[1.0, 2.0], Some(&[0]), 2).unwrap();
        assert_eq!(pooled, vec![0.0, 0.0]);
    }

    #[test]
    fn test_digest_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("model.onnx");
        std::fs::write(&path, b"not a model").unwrap();

        assert!(verify_model_digest(&path, "00").is_err());

        let digest: String = Sha256::digest(b"not a model")
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        assert!(verify_model_digest(&path, &digest.to_uppercase()).is_ok());
    }

    #[test]
    fn test_missing_model_reports_download_hint() {
        let err = OnnxEmbedder::new_from_paths(
            Path::new("/nonexistent/model.onnx"),
            Path::new("/nonexistent/tokenizer.json"),
            "all-MiniLM-L6-v2",
            384,
            None,
            None,
        )
        .err()
        .expect("missing model must fail");
        assert!(err.to_string().contains("ONNX model not found"));
    }

    #[test]
    #[ignore = "requires downloaded model files"]
    fn test_embed_basic() {
        let mut embedder = get_test_embedder();
        let embedding = embedder.embed("She grew up alone after her parents died").unwrap();

        assert_eq!(embedding.len(), 384);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-5);
    }

    #[test]
    #[ignore = "requires downloaded model files"]
    fn test_batch_matches_single() {
        let mut embedder = get_test_embedder();
        let texts = vec![
            "A short line".to_string(),
            "A considerably longer line that forces padding in the batch".to_string(),
        ];
        let batch = embedder.embed_batch(&texts).unwrap();
        let single = embedder.embed(&texts[0]).unwrap();

        let sim = crate::embeddings::cosine_similarity(&batch[0], &single);
        assert!(sim > 0.999, "padded batch row drifted: {}", sim);
    }
}
