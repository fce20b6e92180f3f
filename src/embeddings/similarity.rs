//! Similarity and distance metrics for embeddings

use ndarray::ArrayView1;

/// Squared Euclidean distance between two vectors of one dimension
pub fn squared_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    let diff = &a - &b;
    diff.dot(&diff)
}

/// Map a squared L2 distance onto the cosine scale
///
/// For unit vectors `|a - b|² = 2 - 2·cos`, so this is exact cosine when the
/// inputs are normalized. Raw vectors are clamped into [-1, 1], so the result
/// is for reporting only and never for ranking.
pub fn l2_to_cosine_scale(squared_distance: f32) -> f32 {
    (1.0 - squared_distance / 2.0).clamp(-1.0, 1.0)
}

/// L2 normalize a vector, leaving a zero vector unchanged
pub fn normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm == 0.0 {
        return vec.to_vec();
    }

    vec.iter().map(|x| x / norm).collect()
}

/// Cosine of the angle between two vectors, 0 when either is zero
#[cfg(test)]
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    normalize(a)
        .iter()
        .zip(normalize(b))
        .map(|(x, y)| x * y)
        .sum()
}
