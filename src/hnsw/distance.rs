//! Distance metric implementations for HNSW search.
//!
//! All metrics return a dissimilarity where **lower is better**. Validation
//! policy, held for the whole module: vectors are checked once at the API
//! boundary via [`validate_vector`] (dimension and finiteness), and the
//! per-pair kernels assume validated, equal-length input. Callers holding
//! unvalidated pairs can use [`DistanceMetric::distance_checked`].

use crate::config;
use crate::error::IndexError;
use serde::{Deserialize, Serialize};

/// Distance metric used for vector similarity computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean (L2) distance. Range: \[0, ∞).
    Euclidean,
    /// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
    Cosine,
    /// Negative inner product: `-dot(a, b)`. Lower = higher similarity.
    InnerProduct,
    /// Manhattan (L1) distance. Range: \[0, ∞).
    Manhattan,
    /// Number of positions where the components differ.
    Hamming,
    /// Weighted Jaccard distance `1 - Σmin/Σmax` (non-negative components).
    Jaccard,
}

impl DistanceMetric {
    /// Compute the distance between two equal-length vectors.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => euclidean(a, b),
            DistanceMetric::Cosine => cosine(a, b),
            DistanceMetric::InnerProduct => inner_product(a, b),
            DistanceMetric::Manhattan => manhattan(a, b),
            DistanceMetric::Hamming => hamming(a, b),
            DistanceMetric::Jaccard => jaccard(a, b),
        }
    }

    /// Like [`Self::distance`], but validates both inputs first.
    pub fn distance_checked(&self, a: &[f32], b: &[f32]) -> Result<f32, IndexError> {
        validate_vector(a, a.len())?;
        validate_vector(b, a.len())?;
        Ok(self.distance(a, b))
    }
}

/// Validate a vector at the API boundary.
///
/// Rejects empty vectors, dimension mismatches, oversized dimensions, and
/// non-finite components.
pub fn validate_vector(v: &[f32], expected_dim: usize) -> Result<(), IndexError> {
    if v.is_empty() {
        return Err(IndexError::InvalidVector("empty vector".into()));
    }
    if v.len() != expected_dim {
        return Err(IndexError::InvalidVector(format!(
            "expected dimension {}, got {}",
            expected_dim,
            v.len()
        )));
    }
    if v.len() > config::MAX_DIMENSION {
        return Err(IndexError::InvalidVector(format!(
            "dimension {} exceeds maximum {}",
            v.len(),
            config::MAX_DIMENSION
        )));
    }
    if let Some(x) = v.iter().find(|x| !x.is_finite()) {
        return Err(IndexError::InvalidVector(format!(
            "non-finite component {x}"
        )));
    }
    Ok(())
}

/// Normalize a vector to unit length in place. Zero vectors are left as-is.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum.sqrt()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        // Zero-norm vectors have no direction; treat as fully dissimilar.
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
    }
    -dot
}

fn manhattan(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += (a[i] - b[i]).abs();
    }
    sum
}

fn hamming(a: &[f32], b: &[f32]) -> f32 {
    let mut count = 0u32;
    for i in 0..a.len() {
        if a[i] != b[i] {
            count += 1;
        }
    }
    count as f32
}

fn jaccard(a: &[f32], b: &[f32]) -> f32 {
    let mut num = 0.0f32;
    let mut den = 0.0f32;
    for i in 0..a.len() {
        num += a[i].min(b[i]);
        den += a[i].max(b[i]);
    }
    if den == 0.0 {
        // Both vectors all-zero: identical.
        return 0.0;
    }
    1.0 - num / den
}
