//! Vector store - exact nearest-neighbor search over one bounded collection
//!
//! Vectors are packed into a row-major `ndarray` matrix at build time and the
//! store is immutable afterwards, so any number of readers can query it
//! concurrently. Search is brute force: every query scores every row, which
//! keeps results exact and reproducible for story-sized collections.
//!
//! Scores always leave the store on the cosine scale `[-1, 1]`:
//! - `Cosine`: rows are L2-normalized at build, score = inner product
//! - `L2`: ranked by squared distance, reported as `1 - |a - b|² / 2` clamped
//!   (exact cosine for unit vectors)
//!
//! Ties are broken by insertion index, lowest first.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::embeddings::{l2_to_cosine_scale, normalize, squared_distance};
use crate::error::{CanonError, Result};

/// Similarity metric for a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
}

/// One query result
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: String,
    /// Insertion index of the matched vector
    pub index: usize,
    /// Similarity on the cosine scale
    pub similarity: f32,
}

/// Immutable exact-search vector store
#[derive(Debug, Clone)]
pub struct VectorStore {
    metric: Metric,
    ids: Vec<String>,
    matrix: Array2<f32>,
}

impl VectorStore {
    /// An empty store; every query returns no hits
    pub fn empty(metric: Metric) -> Self {
        Self {
            metric,
            ids: Vec::new(),
            matrix: Array2::zeros((0, 0)),
        }
    }

    /// Build a store from `(id, embedding)` pairs in insertion order
    ///
    /// All vectors must share one dimension and be finite.
    pub fn build(metric: Metric, vectors: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::empty(metric));
        };
        let dimension = first.1.len();
        if dimension == 0 {
            return Err(CanonError::EmptyVector {
                id: first.0.clone(),
            });
        }

        let mut ids = Vec::with_capacity(vectors.len());
        let mut matrix = Array2::<f32>::zeros((vectors.len(), dimension));

        for (row, (id, vector)) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(CanonError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(CanonError::NonFiniteVector { id });
            }

            let stored = match metric {
                Metric::Cosine => normalize(&vector),
                Metric::L2 => vector,
            };
            matrix.row_mut(row).assign(&ArrayView1::from(stored.as_slice()));
            ids.push(id);
        }

        Ok(Self {
            metric,
            ids,
            matrix,
        })
    }

    /// The `k` most similar vectors, best first
    ///
    /// Returns every stored vector when the store holds fewer than `k`.
    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Hit>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != self.matrix.ncols() {
            return Err(CanonError::DimensionMismatch {
                expected: self.matrix.ncols(),
                actual: embedding.len(),
            });
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(CanonError::NonFiniteVector {
                id: "query".to_string(),
            });
        }

        let scores = self.rank_scores(embedding);
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();

        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, rank_order);
            ranked.truncate(k);
        }
        ranked.sort_by(rank_order);

        Ok(ranked
            .into_iter()
            .map(|(index, score)| Hit {
                id: self.ids[index].clone(),
                index,
                similarity: self.to_similarity(score),
            })
            .collect())
    }

    /// Per-row ranking key, higher is closer
    ///
    /// Cosine rows score their inner product; L2 rows score the negated
    /// squared distance so raw vectors keep their true order.
    fn rank_scores(&self, embedding: &[f32]) -> Array1<f32> {
        match self.metric {
            Metric::Cosine => {
                let query = Array1::from(normalize(embedding));
                self.matrix.dot(&query)
            }
            Metric::L2 => {
                let query = ArrayView1::from(embedding);
                self.matrix
                    .rows()
                    .into_iter()
                    .map(|row| -squared_distance(row, query))
                    .collect()
            }
        }
    }

    fn to_similarity(&self, score: f32) -> f32 {
        match self.metric {
            Metric::Cosine => score.clamp(-1.0, 1.0),
            Metric::L2 => l2_to_cosine_scale(-score),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector dimension, or `None` for an empty store
    pub fn dimension(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.matrix.ncols())
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }
}

/// Higher similarity first, then lower insertion index
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}
