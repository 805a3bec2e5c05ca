//! DeltaPQ: product quantization around a learned center vector.
//!
//! Training computes the element-wise mean of the sample ("center"),
//! subtracts it from every sample to obtain delta vectors, splits each delta
//! into contiguous subvectors, and runs k-means (k-means++ seeding, fixed
//! iteration cap) per subvector position. A vector is then encoded as one
//! code byte per subvector indexing that position's centroid list.
//! Approximate distance between two codes sums per-subvector centroid
//! distances without reconstructing either vector.

use crate::config;
use crate::error::IndexError;
use crate::hnsw::distance::validate_vector;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// DeltaPQ tuning parameters. Immutable after training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaPqConfig {
    /// Number of contiguous subvectors per vector.
    pub num_subvectors: usize,
    /// Code width in bits; `2^bits_per_code` centroids per subvector (max 8).
    pub bits_per_code: usize,
    /// Maximum k-means iterations per subvector position.
    pub max_iterations: usize,
}

impl Default for DeltaPqConfig {
    fn default() -> Self {
        Self {
            num_subvectors: config::PQ_DEFAULT_SUBVECTORS,
            bits_per_code: config::PQ_DEFAULT_BITS_PER_CODE,
            max_iterations: config::PQ_KMEANS_ITERATIONS,
        }
    }
}

/// Trained codebook: center vector plus per-subvector centroid lists.
///
/// Centroid slots are `sub_dim` wide; the final subvector may be narrower
/// (`sub_dim = ceil(dim / num_subvectors)`) and its slot tail stays zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaPqCodebook {
    pub center: Vec<f32>,
    pub dimension: usize,
    pub num_subvectors: usize,
    /// Centroids actually trained per subvector (≤ `2^bits_per_code`).
    pub num_centroids: usize,
    pub sub_dim: usize,
    /// Flat: `centroids[sub * num_centroids * sub_dim + c * sub_dim ..]`.
    pub centroids: Vec<f32>,
}

impl DeltaPqCodebook {
    /// Start offset and width of a subvector within the full vector.
    #[inline]
    fn bounds(&self, sub: usize) -> (usize, usize) {
        let start = sub * self.sub_dim;
        let width = self.sub_dim.min(self.dimension.saturating_sub(start));
        (start, width)
    }

    #[inline]
    fn centroid(&self, sub: usize, code: usize) -> &[f32] {
        let start = (sub * self.num_centroids + code) * self.sub_dim;
        &self.centroids[start..start + self.sub_dim]
    }
}

/// Metrics recorded by training.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Mean L2 distance between a training sample and its reconstruction.
    pub avg_reconstruction_error: f32,
    /// `32·dim / (bits_per_code · num_subvectors)`.
    pub compression_ratio: f32,
    /// Number of samples trained on.
    pub samples: usize,
}

/// DeltaPQ quantizer. Untrained until [`DeltaPq::train`] succeeds; every
/// quantize/dequantize/distance call before that fails with `NotTrained`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaPq {
    pub config: DeltaPqConfig,
    codebook: Option<DeltaPqCodebook>,
    stats: Option<TrainingStats>,
}

impl DeltaPq {
    pub fn new(config: DeltaPqConfig) -> Self {
        Self {
            config,
            codebook: None,
            stats: None,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(DeltaPqConfig::default())
    }

    pub fn is_trained(&self) -> bool {
        self.codebook.is_some()
    }

    pub fn codebook(&self) -> Option<&DeltaPqCodebook> {
        self.codebook.as_ref()
    }

    pub fn stats(&self) -> Option<TrainingStats> {
        self.stats
    }

    /// Train the codebook on a sample of vectors.
    ///
    /// All samples must share one dimension; a mismatch is fatal to the
    /// operation (`InvalidVector`), not skipped. Retraining replaces the
    /// codebook wholesale.
    pub fn train(&mut self, samples: &[Vec<f32>]) -> Result<TrainingStats, IndexError> {
        if samples.is_empty() {
            return Err(IndexError::InvalidVector(
                "cannot train on an empty sample".into(),
            ));
        }
        if self.config.bits_per_code == 0 || self.config.bits_per_code > 8 {
            return Err(IndexError::InvalidVector(format!(
                "bits_per_code must be in 1..=8, got {}",
                self.config.bits_per_code
            )));
        }
        let dim = samples[0].len();
        for sample in samples {
            validate_vector(sample, dim)?;
        }
        let m = self.config.num_subvectors.min(dim).max(1);
        let n = samples.len();
        let sub_dim = dim.div_ceil(m);
        let k = (1usize << self.config.bits_per_code).min(n);

        // Center = element-wise mean of the sample.
        let mut center = vec![0.0f32; dim];
        for sample in samples {
            for (c, &x) in center.iter_mut().zip(sample.iter()) {
                *c += x;
            }
        }
        for c in center.iter_mut() {
            *c /= n as f32;
        }

        // Delta vectors, contiguous.
        let mut deltas = vec![0.0f32; n * dim];
        for (i, sample) in samples.iter().enumerate() {
            for (j, &x) in sample.iter().enumerate() {
                deltas[i * dim + j] = x - center[j];
            }
        }

        let mut centroids = vec![0.0f32; m * k * sub_dim];
        let mut rng = rand::rng();
        for sub in 0..m {
            let start = sub * sub_dim;
            let width = sub_dim.min(dim.saturating_sub(start));
            if width == 0 {
                // Vector exhausted before the last subvector; centroids stay zero.
                continue;
            }

            let mut sub_vectors = vec![0.0f32; n * width];
            for i in 0..n {
                sub_vectors[i * width..(i + 1) * width]
                    .copy_from_slice(&deltas[i * dim + start..i * dim + start + width]);
            }

            let sub_centroids = kmeans(
                &sub_vectors,
                width,
                k,
                self.config.max_iterations,
                &mut rng,
            );
            for (c, chunk) in sub_centroids.chunks(width).enumerate() {
                let out = (sub * k + c) * sub_dim;
                centroids[out..out + width].copy_from_slice(chunk);
            }
        }

        let codebook = DeltaPqCodebook {
            center,
            dimension: dim,
            num_subvectors: m,
            num_centroids: k,
            sub_dim,
            centroids,
        };

        // Average reconstruction error over the training sample.
        let mut total_err = 0.0f64;
        for sample in samples {
            let codes = encode(&codebook, sample);
            let recon = decode(&codebook, &codes);
            let mut err = 0.0f32;
            for (a, b) in sample.iter().zip(recon.iter()) {
                let d = a - b;
                err += d * d;
            }
            total_err += f64::from(err.sqrt());
        }

        let stats = TrainingStats {
            avg_reconstruction_error: (total_err / n as f64) as f32,
            compression_ratio: (32.0 * dim as f32)
                / (self.config.bits_per_code as f32 * m as f32),
            samples: n,
        };
        tracing::info!(
            dimension = dim,
            subvectors = m,
            centroids = k,
            samples = n,
            avg_reconstruction_error = stats.avg_reconstruction_error,
            "trained DeltaPQ codebook"
        );
        self.codebook = Some(codebook);
        self.stats = Some(stats);
        Ok(stats)
    }

    /// Encode a vector as one code byte per subvector.
    pub fn quantize(&self, vector: &[f32]) -> Result<Vec<u8>, IndexError> {
        let cb = self.codebook.as_ref().ok_or(IndexError::NotTrained)?;
        validate_vector(vector, cb.dimension)?;
        Ok(encode(cb, vector))
    }

    /// Reconstruct an approximation: center + indexed centroids.
    pub fn dequantize(&self, codes: &[u8]) -> Result<Vec<f32>, IndexError> {
        let cb = self.codebook.as_ref().ok_or(IndexError::NotTrained)?;
        self.check_codes(cb, codes)?;
        Ok(decode(cb, codes))
    }

    /// Approximate Euclidean distance between two encoded vectors:
    /// per-subvector squared centroid distances summed, then square-rooted.
    /// O(num_subvectors · sub_dim) instead of O(dim) reconstruction work.
    pub fn approx_distance(&self, a: &[u8], b: &[u8]) -> Result<f32, IndexError> {
        let cb = self.codebook.as_ref().ok_or(IndexError::NotTrained)?;
        self.check_codes(cb, a)?;
        self.check_codes(cb, b)?;

        let mut sum = 0.0f32;
        for sub in 0..cb.num_subvectors {
            let (_, width) = cb.bounds(sub);
            let ca = cb.centroid(sub, a[sub] as usize);
            let cc = cb.centroid(sub, b[sub] as usize);
            for d in 0..width {
                let diff = ca[d] - cc[d];
                sum += diff * diff;
            }
        }
        Ok(sum.sqrt())
    }

    fn check_codes(&self, cb: &DeltaPqCodebook, codes: &[u8]) -> Result<(), IndexError> {
        if codes.len() != cb.num_subvectors {
            return Err(IndexError::InvalidVector(format!(
                "expected {} codes, got {}",
                cb.num_subvectors,
                codes.len()
            )));
        }
        if let Some(&c) = codes.iter().find(|&&c| c as usize >= cb.num_centroids) {
            return Err(IndexError::CorruptState(format!(
                "code {c} out of range for {} centroids",
                cb.num_centroids
            )));
        }
        Ok(())
    }
}

fn encode(cb: &DeltaPqCodebook, vector: &[f32]) -> Vec<u8> {
    let mut codes = Vec::with_capacity(cb.num_subvectors);
    let mut delta = vec![0.0f32; cb.sub_dim];
    for sub in 0..cb.num_subvectors {
        let (start, width) = cb.bounds(sub);
        for d in 0..width {
            delta[d] = vector[start + d] - cb.center[start + d];
        }

        // Exhaustive nearest-centroid scan; the codebook is small.
        let mut best = 0u8;
        let mut best_dist = f32::MAX;
        for c in 0..cb.num_centroids {
            let centroid = cb.centroid(sub, c);
            let mut dist = 0.0f32;
            for d in 0..width {
                let diff = delta[d] - centroid[d];
                dist += diff * diff;
            }
            if dist < best_dist {
                best_dist = dist;
                best = c as u8;
            }
        }
        codes.push(best);
    }
    codes
}

fn decode(cb: &DeltaPqCodebook, codes: &[u8]) -> Vec<f32> {
    let mut out = cb.center.clone();
    for (sub, &code) in codes.iter().enumerate() {
        let (start, width) = cb.bounds(sub);
        let centroid = cb.centroid(sub, code as usize);
        for d in 0..width {
            out[start + d] += centroid[d];
        }
    }
    out
}

/// K-means with k-means++ initialization and a fixed iteration cap.
/// Returns `k × width` centroids as a flat vector.
fn kmeans<R: Rng>(data: &[f32], width: usize, k: usize, iterations: usize, rng: &mut R) -> Vec<f32> {
    let n = data.len() / width;
    if n <= k {
        // Fewer points than centroids: each point is its own centroid.
        let mut centroids = vec![0.0f32; k * width];
        centroids[..n * width].copy_from_slice(&data[..n * width]);
        return centroids;
    }

    // K-means++ seeding: first centroid uniform, the rest weighted by
    // squared distance to the nearest chosen centroid.
    let mut centroids = vec![0.0f32; k * width];
    let first = rng.random_range(0..n);
    centroids[..width].copy_from_slice(&data[first * width..(first + 1) * width]);

    let mut min_dists = vec![f32::MAX; n];
    for ci in 1..k {
        let last = &centroids[(ci - 1) * width..ci * width];
        let mut total = 0.0f64;
        for i in 0..n {
            let d = sq_dist(&data[i * width..(i + 1) * width], last);
            if d < min_dists[i] {
                min_dists[i] = d;
            }
            total += f64::from(min_dists[i]);
        }

        if total < 1e-30 {
            // All points coincide with existing centroids.
            let idx = rng.random_range(0..n);
            centroids[ci * width..(ci + 1) * width]
                .copy_from_slice(&data[idx * width..(idx + 1) * width]);
            continue;
        }
        let threshold = rng.random::<f64>() * total;
        let mut cumulative = 0.0f64;
        let mut chosen = n - 1;
        for (i, &d) in min_dists.iter().enumerate() {
            cumulative += f64::from(d);
            if cumulative >= threshold {
                chosen = i;
                break;
            }
        }
        centroids[ci * width..(ci + 1) * width]
            .copy_from_slice(&data[chosen * width..(chosen + 1) * width]);
    }

    // Lloyd iterations.
    let mut assignments = vec![0usize; n];
    for _ in 0..iterations {
        for i in 0..n {
            let point = &data[i * width..(i + 1) * width];
            let mut best = 0usize;
            let mut best_dist = f32::MAX;
            for ci in 0..k {
                let d = sq_dist(point, &centroids[ci * width..(ci + 1) * width]);
                if d < best_dist {
                    best_dist = d;
                    best = ci;
                }
            }
            assignments[i] = best;
        }

        let mut counts = vec![0u32; k];
        let mut sums = vec![0.0f32; k * width];
        for i in 0..n {
            let ci = assignments[i];
            counts[ci] += 1;
            let point = &data[i * width..(i + 1) * width];
            let acc = &mut sums[ci * width..(ci + 1) * width];
            for d in 0..width {
                acc[d] += point[d];
            }
        }
        for ci in 0..k {
            if counts[ci] > 0 {
                let inv = 1.0 / counts[ci] as f32;
                let out = &mut centroids[ci * width..(ci + 1) * width];
                for (o, &s) in out.iter_mut().zip(sums[ci * width..(ci + 1) * width].iter()) {
                    *o = s * inv;
                }
            }
        }
    }

    centroids
}

#[inline]
fn sq_dist(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::DistanceMetric;

    fn make_vector(dim: usize, seed: usize) -> Vec<f32> {
        (0..dim)
            .map(|j| (((seed + 1) * 2654435761 + j * 40503) & 0xFFFF) as f32 / 65535.0)
            .collect()
    }

    fn trained_quantizer(dim: usize, n: usize) -> (DeltaPq, Vec<Vec<f32>>) {
        let samples: Vec<Vec<f32>> = (0..n).map(|i| make_vector(dim, i)).collect();
        let mut pq = DeltaPq::with_default_config();
        pq.train(&samples).unwrap();
        (pq, samples)
    }

    #[test]
    fn test_untrained_operations_fail() {
        let pq = DeltaPq::with_default_config();
        assert!(matches!(
            pq.quantize(&[1.0; 16]),
            Err(IndexError::NotTrained)
        ));
        assert!(matches!(pq.dequantize(&[0; 8]), Err(IndexError::NotTrained)));
        assert!(matches!(
            pq.approx_distance(&[0; 8], &[0; 8]),
            Err(IndexError::NotTrained)
        ));
    }

    #[test]
    fn test_train_rejects_empty_and_mismatched() {
        let mut pq = DeltaPq::with_default_config();
        assert!(pq.train(&[]).is_err());
        let bad = vec![vec![1.0, 2.0], vec![1.0, 2.0, 3.0]];
        assert!(pq.train(&bad).is_err());
        assert!(!pq.is_trained());
    }

    #[test]
    fn test_samples_reconstruct_exactly_when_few() {
        // With n ≤ 2^bits every sample becomes its own centroid, so training
        // samples round-trip through quantize/dequantize without loss.
        let (pq, samples) = trained_quantizer(16, 32);
        for sample in &samples {
            let codes = pq.quantize(sample).unwrap();
            let recon = pq.dequantize(&codes).unwrap();
            for (a, b) in sample.iter().zip(recon.iter()) {
                assert!((a - b).abs() < 1e-4, "lossless for sample points");
            }
        }
        let stats = pq.stats().unwrap();
        assert!(stats.avg_reconstruction_error < 1e-3);
    }

    #[test]
    fn test_approx_distance_matches_exact_for_sample_points() {
        let (pq, samples) = trained_quantizer(16, 32);
        let metric = DistanceMetric::Euclidean;
        for i in (0..samples.len()).step_by(5) {
            for j in (i..samples.len()).step_by(7) {
                let ca = pq.quantize(&samples[i]).unwrap();
                let cb = pq.quantize(&samples[j]).unwrap();
                let approx = pq.approx_distance(&ca, &cb).unwrap();
                let exact = metric.distance(&samples[i], &samples[j]);
                assert!(
                    (approx - exact).abs() < 1e-3,
                    "approx {approx} vs exact {exact}"
                );
            }
        }
    }

    #[test]
    fn test_approx_distance_bounded_error_on_random_batch() {
        // Statistical property: on unseen vectors the approximation tracks
        // the true distance within a loose tolerance.
        let (pq, _) = trained_quantizer(16, 400);
        let metric = DistanceMetric::Euclidean;
        let mut total_exact = 0.0f32;
        let mut total_err = 0.0f32;
        for i in 0..40 {
            let a = make_vector(16, 1000 + i);
            let b = make_vector(16, 2000 + i);
            let approx = pq
                .approx_distance(&pq.quantize(&a).unwrap(), &pq.quantize(&b).unwrap())
                .unwrap();
            let exact = metric.distance(&a, &b);
            total_exact += exact;
            total_err += (approx - exact).abs();
        }
        assert!(
            total_err < total_exact * 0.35,
            "mean approximation error too large: {total_err} vs {total_exact}"
        );
    }

    #[test]
    fn test_self_distance_is_zero() {
        let (pq, samples) = trained_quantizer(16, 32);
        let codes = pq.quantize(&samples[0]).unwrap();
        assert_eq!(pq.approx_distance(&codes, &codes).unwrap(), 0.0);
    }

    #[test]
    fn test_compression_ratio() {
        let (pq, _) = trained_quantizer(64, 32);
        let stats = pq.stats().unwrap();
        // 32 * 64 / (8 * 8) = 32
        assert!((stats.compression_ratio - 32.0).abs() < 1e-6);
    }

    #[test]
    fn test_ragged_final_subvector() {
        // dim 10 with 8 subvectors: sub_dim = ceil(10/8) = 2, so the first
        // five subvectors cover the vector and the rest are empty.
        let samples: Vec<Vec<f32>> = (0..20).map(|i| make_vector(10, i)).collect();
        let mut pq = DeltaPq::with_default_config();
        pq.train(&samples).unwrap();
        let codes = pq.quantize(&samples[3]).unwrap();
        let recon = pq.dequantize(&codes).unwrap();
        assert_eq!(recon.len(), 10);
        for (a, b) in samples[3].iter().zip(recon.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_code_validation() {
        let (pq, samples) = trained_quantizer(16, 8);
        let codes = pq.quantize(&samples[0]).unwrap();
        assert!(pq.dequantize(&codes[..4]).is_err(), "wrong code length");
        // 8 samples -> 8 centroids; code 200 is out of range
        let bad = vec![200u8; codes.len()];
        assert!(matches!(
            pq.approx_distance(&bad, &codes),
            Err(IndexError::CorruptState(_))
        ));
    }

    #[test]
    fn test_quantize_rejects_wrong_dimension() {
        let (pq, _) = trained_quantizer(16, 8);
        assert!(pq.quantize(&[1.0; 8]).is_err());
    }
}
