//! HNSW graph combined with a DeltaPQ quantizer.
//!
//! A [`CombinedIndex`] buffers raw vectors until a configured training
//! threshold is reached, trains the quantizer synchronously on the buffer,
//! then flushes buffered vectors into the graph in insertion order. Until training completes, searches fall back to an exact linear
//! scan over the buffer so results stay correct from the first insert.
//! Callers address vectors by stable external `u64` ids; the graph's dense
//! internal `u32` ids never leak out.

use crate::config;
use crate::error::IndexError;
use crate::hnsw::{knn_search, DistanceCache, HnswConfig, HnswIndex};
use crate::hnsw::distance::{normalize, validate_vector};
use crate::quantization::{DeltaPq, DeltaPqConfig};
use crate::storage::{decode_blob, encode_blob, load_blob, save_blob};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Configuration for a combined index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedConfig {
    pub hnsw: HnswConfig,
    pub pq: DeltaPqConfig,
    /// Number of buffered vectors that triggers quantizer training.
    pub training_threshold: usize,
    /// Keep raw vectors in the graph arena after training. When false the
    /// arena stores DeltaPQ reconstructions instead, trading exactness for
    /// the compressed codes being the only full-precision state.
    pub store_raw_vectors: bool,
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            hnsw: HnswConfig::default(),
            pq: DeltaPqConfig::default(),
            training_threshold: config::PQ_DEFAULT_TRAINING_THRESHOLD,
            store_raw_vectors: true,
        }
    }
}

/// Per-query knobs for [`CombinedIndex::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Overrides the index's `ef_search` for this query.
    pub ef: Option<usize>,
    /// External ids to exclude from the result set.
    pub exclude_ids: Option<HashSet<u64>>,
    /// Re-rank graph candidates by code-to-code approximate distance instead
    /// of the graph's stored-vector distances. Cheaper per candidate on
    /// high-dimensional data, at some recall cost. Ignored while untrained.
    pub use_quantized_rerank: bool,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<P> {
    pub id: u64,
    pub distance: f32,
    pub payload: P,
}

/// Summary of a batch insert: malformed vectors are skipped, not fatal.
#[derive(Debug, Clone, Default)]
pub struct AddBatchReport {
    pub ids: Vec<u64>,
    pub skipped: usize,
}

/// Internal state of a combined index, protected by a `RwLock`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CombinedIndexData<P> {
    pub config: CombinedConfig,
    pub hnsw: HnswIndex,
    pub quantizer: DeltaPq,
    /// DeltaPQ codes per external id. Empty until training.
    pub codes: HashMap<u64, Vec<u8>>,
    pub payloads: HashMap<u64, P>,
    pub external_to_internal: HashMap<u64, u32>,
    pub internal_to_external: HashMap<u32, u64>,
    /// Raw vectors buffered before training, in insertion order.
    pub pending: Vec<(u64, Vec<f32>)>,
    pub next_id: u64,
}

impl<P: Clone> CombinedIndexData<P> {
    pub fn new(config: CombinedConfig) -> Self {
        let hnsw = HnswIndex::new(0, config.hnsw.clone());
        let quantizer = DeltaPq::new(config.pq.clone());
        Self {
            config,
            hnsw,
            quantizer,
            codes: HashMap::new(),
            payloads: HashMap::new(),
            external_to_internal: HashMap::new(),
            internal_to_external: HashMap::new(),
            pending: Vec::new(),
            next_id: 0,
        }
    }

    /// Dimension fixed by the first inserted vector, if any.
    pub fn dimension(&self) -> Option<usize> {
        if self.hnsw.node_count > 0 {
            Some(self.hnsw.dimension)
        } else {
            self.pending.first().map(|(_, v)| v.len())
        }
    }

    /// Number of live vectors (graph plus training buffer).
    pub fn len(&self) -> usize {
        self.hnsw.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_trained(&self) -> bool {
        self.quantizer.is_trained()
    }

    /// Insert a vector and its payload, returning the assigned id.
    ///
    /// Before training the vector is buffered; reaching the training
    /// threshold trains the quantizer and flushes the whole buffer into the
    /// graph before this call returns.
    pub fn add(&mut self, vector: Vec<f32>, payload: P) -> Result<u64, IndexError> {
        let id = self.next_id;
        self.add_with_id(id, vector, payload)?;
        Ok(id)
    }

    /// Insert under a caller-chosen id. Used by the partition manager, which
    /// assigns ids globally across partitions.
    pub fn add_with_id(&mut self, id: u64, vector: Vec<f32>, payload: P) -> Result<(), IndexError> {
        let expected = self.dimension().unwrap_or(vector.len());
        validate_vector(&vector, expected)?;
        if self.payloads.contains_key(&id) {
            return Err(IndexError::InvalidVector(format!("id {id} already present")));
        }

        if self.quantizer.is_trained() {
            let mut cache = DistanceCache::new(config::DISTANCE_CACHE_DEFAULT_CAPACITY);
            self.insert_trained(id, &vector, &mut cache)?;
        } else {
            self.pending.push((id, vector));
        }
        self.payloads.insert(id, payload);
        self.next_id = self.next_id.max(id + 1);

        if !self.quantizer.is_trained() && self.pending.len() >= self.config.training_threshold {
            self.train_and_flush()?;
        }
        Ok(())
    }

    /// Insert many vectors; malformed ones are skipped and counted.
    pub fn add_batch(&mut self, batch: Vec<(Vec<f32>, P)>) -> AddBatchReport {
        let mut report = AddBatchReport::default();
        for (pos, (vector, payload)) in batch.into_iter().enumerate() {
            match self.add(vector, payload) {
                Ok(id) => report.ids.push(id),
                Err(e) => {
                    tracing::debug!("skipping vector {} in batch: {}", pos, e);
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// Train the quantizer on the buffer, then flush it into the graph in
    /// insertion order.
    fn train_and_flush(&mut self) -> Result<(), IndexError> {
        let samples: Vec<Vec<f32>> = self.pending.iter().map(|(_, v)| v.clone()).collect();
        let stats = self.quantizer.train(&samples)?;
        tracing::info!(
            samples = stats.samples,
            avg_reconstruction_error = stats.avg_reconstruction_error,
            compression_ratio = stats.compression_ratio,
            "quantizer trained, flushing buffered vectors"
        );

        let pending = std::mem::take(&mut self.pending);
        let mut cache = DistanceCache::new(config::DISTANCE_CACHE_DEFAULT_CAPACITY);
        for (id, vector) in pending {
            self.insert_trained(id, &vector, &mut cache)?;
        }
        Ok(())
    }

    fn insert_trained(
        &mut self,
        id: u64,
        vector: &[f32],
        cache: &mut DistanceCache,
    ) -> Result<(), IndexError> {
        let codes = self.quantizer.quantize(vector)?;
        let internal = if self.config.store_raw_vectors {
            self.hnsw.insert_with_cache(vector, cache)?
        } else {
            let reconstruction = self.quantizer.dequantize(&codes)?;
            self.hnsw.insert_with_cache(&reconstruction, cache)?
        };
        self.codes.insert(id, codes);
        self.external_to_internal.insert(id, internal);
        self.internal_to_external.insert(internal, id);
        Ok(())
    }

    /// Remove a vector by id. Returns `false` for unknown or already
    /// removed ids.
    pub fn remove(&mut self, id: u64) -> bool {
        if let Some(internal) = self.external_to_internal.remove(&id) {
            self.hnsw.remove(internal);
            self.internal_to_external.remove(&internal);
            self.codes.remove(&id);
            self.payloads.remove(&id);
            return true;
        }
        if let Some(pos) = self.pending.iter().position(|(pid, _)| *pid == id) {
            // Keep buffer order intact; flush order must match insertion order.
            self.pending.remove(pos);
            self.payloads.remove(&id);
            return true;
        }
        false
    }

    /// K-nearest-neighbor search. Untrained indexes fall back to an exact
    /// linear scan over the buffer.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult<P>>, IndexError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let dim = match self.dimension() {
            Some(d) => d,
            None => return Ok(Vec::new()),
        };
        validate_vector(query, dim)?;

        if !self.quantizer.is_trained() {
            return Ok(self.linear_scan(query, k, options));
        }

        let exclude: Option<HashSet<u32>> = options.exclude_ids.as_ref().map(|ids| {
            ids.iter()
                .filter_map(|id| self.external_to_internal.get(id).copied())
                .collect()
        });
        // Over-fetch when reranking so the rerank has candidates to reorder.
        let fetch = if options.use_quantized_rerank { k * 2 } else { k };
        let hits = knn_search(&self.hnsw, query, fetch, options.ef, exclude.as_ref());

        let mut results = Vec::with_capacity(hits.len());
        for (distance, internal) in hits {
            if let Some(&id) = self.internal_to_external.get(&internal) {
                if let Some(payload) = self.payloads.get(&id) {
                    results.push(SearchResult {
                        id,
                        distance,
                        payload: payload.clone(),
                    });
                }
            }
        }

        if results.is_empty() && !self.external_to_internal.is_empty() {
            // The graph found nothing despite live nodes (tiny or badly
            // connected graphs). Fall back to an exact scan over live nodes.
            return Ok(self.scan_graph_nodes(query, k, options));
        }

        if options.use_quantized_rerank {
            let query_codes = self.quantizer.quantize(query)?;
            for hit in results.iter_mut() {
                if let Some(codes) = self.codes.get(&hit.id) {
                    hit.distance = self.quantizer.approx_distance(&query_codes, codes)?;
                }
            }
            results.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });
            results.truncate(k);
        }
        Ok(results)
    }

    /// Exact scan over the graph's live nodes. Correctness fallback only.
    fn scan_graph_nodes(&self, query: &[f32], k: usize, options: &SearchOptions) -> Vec<SearchResult<P>> {
        let effective_query: Vec<f32> = if self.hnsw.config.normalize_vectors {
            let mut q = query.to_vec();
            normalize(&mut q);
            q
        } else {
            query.to_vec()
        };
        let mut scored: Vec<(f32, u64)> = self
            .external_to_internal
            .iter()
            .filter(|(id, internal)| {
                !self.hnsw.is_deleted(**internal)
                    && options
                        .exclude_ids
                        .as_ref()
                        .is_none_or(|ex| !ex.contains(*id))
            })
            .map(|(&id, &internal)| (self.hnsw.query_distance(&effective_query, internal), id))
            .collect();
        scored.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
            .into_iter()
            .filter_map(|(distance, id)| {
                self.payloads.get(&id).map(|payload| SearchResult {
                    id,
                    distance,
                    payload: payload.clone(),
                })
            })
            .collect()
    }

    fn linear_scan(&self, query: &[f32], k: usize, options: &SearchOptions) -> Vec<SearchResult<P>> {
        let metric = self.hnsw.config.distance_metric;
        let effective_query: Vec<f32> = if self.hnsw.config.normalize_vectors {
            let mut q = query.to_vec();
            normalize(&mut q);
            q
        } else {
            query.to_vec()
        };

        let mut scored: Vec<(f32, u64)> = self
            .pending
            .iter()
            .filter(|(id, _)| {
                options
                    .exclude_ids
                    .as_ref()
                    .is_none_or(|ex| !ex.contains(id))
            })
            .map(|(id, v)| {
                let distance = if self.hnsw.config.normalize_vectors {
                    let mut nv = v.clone();
                    normalize(&mut nv);
                    metric.distance(&effective_query, &nv)
                } else {
                    metric.distance(&effective_query, v)
                };
                (distance, *id)
            })
            .collect();
        scored.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .filter_map(|(distance, id)| {
                self.payloads.get(&id).map(|payload| SearchResult {
                    id,
                    distance,
                    payload: payload.clone(),
                })
            })
            .collect()
    }

    /// Validate internal invariants after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        self.hnsw.validate()?;

        if self.external_to_internal.len() != self.internal_to_external.len() {
            return Err(format!(
                "id maps asymmetric: {} external vs {} internal entries",
                self.external_to_internal.len(),
                self.internal_to_external.len()
            ));
        }
        for (&id, &internal) in &self.external_to_internal {
            if self.internal_to_external.get(&internal) != Some(&id) {
                return Err(format!("id map asymmetry for external id {id}"));
            }
            if self.hnsw.is_deleted(internal) {
                return Err(format!("external id {id} maps to deleted node {internal}"));
            }
            if id >= self.next_id {
                return Err(format!("external id {id} >= next_id {}", self.next_id));
            }
            if !self.payloads.contains_key(&id) {
                return Err(format!("external id {id} has no payload"));
            }
            if self.quantizer.is_trained() && !self.codes.contains_key(&id) {
                return Err(format!("external id {id} has no quantized codes"));
            }
        }
        for (id, _) in &self.pending {
            if self.external_to_internal.contains_key(id) {
                return Err(format!("id {id} is both buffered and in the graph"));
            }
            if !self.payloads.contains_key(id) {
                return Err(format!("buffered id {id} has no payload"));
            }
        }
        if !self.pending.is_empty() && self.quantizer.is_trained() {
            return Err("trained index still holds a training buffer".into());
        }
        Ok(())
    }
}

/// Thread-safe handle to a combined index.
#[derive(Debug, Clone)]
pub struct CombinedIndex<P> {
    pub data: Arc<RwLock<CombinedIndexData<P>>>,
}

impl<P: Clone> CombinedIndex<P> {
    pub fn new(config: CombinedConfig) -> Self {
        Self::from_data(CombinedIndexData::new(config))
    }

    pub fn with_default_config() -> Self {
        Self::new(CombinedConfig::default())
    }

    pub fn from_data(data: CombinedIndexData<P>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub fn add(&self, vector: Vec<f32>, payload: P) -> Result<u64, IndexError> {
        self.data.write().add(vector, payload)
    }

    pub fn add_batch(&self, batch: Vec<(Vec<f32>, P)>) -> AddBatchReport {
        self.data.write().add_batch(batch)
    }

    pub fn remove(&self, id: u64) -> bool {
        self.data.write().remove(id)
    }

    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult<P>>, IndexError> {
        self.data.read().search(query, k, options)
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn is_trained(&self) -> bool {
        self.data.read().is_trained()
    }
}

impl<P: Clone + Serialize + DeserializeOwned> CombinedIndex<P> {
    /// Serialize the whole index (graph, codebooks, id maps, buffer) as one
    /// versioned blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        encode_blob(&*self.data.read())
    }

    /// Restore an index from [`CombinedIndex::to_bytes`] output, validating
    /// structural invariants before accepting it.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let data: CombinedIndexData<P> = decode_blob(bytes)?;
        data.validate().map_err(IndexError::CorruptState)?;
        Ok(Self::from_data(data))
    }

    /// Write a snapshot to disk atomically.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        save_blob(&*self.data.read(), path)
    }

    /// Load a snapshot written by [`CombinedIndex::save`].
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let data: CombinedIndexData<P> = load_blob(path)?;
        data.validate().map_err(IndexError::CorruptState)?;
        Ok(Self::from_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_vector(dim: usize, seed: usize) -> Vec<f32> {
        (0..dim)
            .map(|j| (((seed + 1) * 2654435761 + j * 40503) & 0xFFFF) as f32 / 65535.0)
            .collect()
    }

    fn small_config(training_threshold: usize) -> CombinedConfig {
        CombinedConfig {
            training_threshold,
            ..CombinedConfig::default()
        }
    }

    fn filled_index(n: usize, dim: usize, threshold: usize) -> CombinedIndex<String> {
        let index = CombinedIndex::new(small_config(threshold));
        for i in 0..n {
            index
                .add(make_vector(dim, i), format!("payload-{i}"))
                .unwrap();
        }
        index
    }

    // ── Untrained fallback ──────────────────────────────────────────────

    #[test]
    fn test_untrained_self_match() {
        let index = filled_index(10, 8, 100);
        assert!(!index.is_trained());
        for i in 0..10 {
            let hits = index
                .search(&make_vector(8, i), 1, &SearchOptions::default())
                .unwrap();
            assert_eq!(hits[0].id, i as u64);
            assert!(hits[0].distance < 1e-6);
            assert_eq!(hits[0].payload, format!("payload-{i}"));
        }
    }

    #[test]
    fn test_untrained_results_sorted_and_capped() {
        let index = filled_index(20, 8, 100);
        let hits = index
            .search(&make_vector(8, 3), 5, &SearchOptions::default())
            .unwrap();
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    // ── Training transition ─────────────────────────────────────────────

    #[test]
    fn test_auto_train_at_threshold() {
        let index = CombinedIndex::new(small_config(16));
        for i in 0..15 {
            index.add(make_vector(8, i), i).unwrap();
        }
        assert!(!index.is_trained());
        index.add(make_vector(8, 15), 15).unwrap();
        assert!(index.is_trained());
        assert_eq!(index.len(), 16);
        assert!(index.data.read().pending.is_empty());
        index.data.read().validate().unwrap();
    }

    #[test]
    fn test_trained_self_match() {
        let index = filled_index(30, 8, 16);
        assert!(index.is_trained());
        for i in 0..30 {
            let hits = index
                .search(&make_vector(8, i), 1, &SearchOptions::default())
                .unwrap();
            assert_eq!(hits[0].id, i as u64, "self-match for vector {i}");
            assert!(hits[0].distance < 1e-6);
        }
    }

    #[test]
    fn test_ids_stable_across_training() {
        let index = CombinedIndex::new(small_config(8));
        let mut ids = Vec::new();
        for i in 0..12 {
            ids.push(index.add(make_vector(8, i), ()).unwrap());
        }
        assert_eq!(ids, (0..12).collect::<Vec<u64>>());
    }

    // ── Removal ─────────────────────────────────────────────────────────

    #[test]
    fn test_removed_id_never_returned() {
        let index = filled_index(30, 8, 16);
        assert!(index.remove(7));
        for i in 0..30 {
            let hits = index
                .search(&make_vector(8, i), 30, &SearchOptions::default())
                .unwrap();
            assert!(hits.iter().all(|h| h.id != 7));
        }
        assert!(!index.remove(7), "second removal is a no-op");
    }

    #[test]
    fn test_remove_buffered_vector() {
        let index = filled_index(5, 8, 100);
        assert!(index.remove(2));
        assert_eq!(index.len(), 4);
        let hits = index
            .search(&make_vector(8, 2), 5, &SearchOptions::default())
            .unwrap();
        assert!(hits.iter().all(|h| h.id != 2));
    }

    #[test]
    fn test_remove_unknown_id() {
        let index = filled_index(5, 8, 100);
        assert!(!index.remove(999));
    }

    // ── Search options ──────────────────────────────────────────────────

    #[test]
    fn test_exclude_ids() {
        let index = filled_index(30, 8, 16);
        let exclude: HashSet<u64> = [0, 1, 2].into_iter().collect();
        let options = SearchOptions {
            exclude_ids: Some(exclude),
            ..SearchOptions::default()
        };
        let hits = index.search(&make_vector(8, 0), 10, &options).unwrap();
        assert!(hits.iter().all(|h| h.id > 2));
    }

    #[test]
    fn test_quantized_rerank() {
        let index = filled_index(40, 16, 20);
        let options = SearchOptions {
            use_quantized_rerank: true,
            ..SearchOptions::default()
        };
        let hits = index.search(&make_vector(16, 5), 5, &options).unwrap();
        assert_eq!(hits.len(), 5);
        // Distances are code-to-code approximations but stay sorted, and the
        // self-match still wins (its codes equal the query's codes).
        assert_eq!(hits[0].id, 5);
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_add_batch_skips_malformed() {
        let index: CombinedIndex<u32> = CombinedIndex::new(small_config(100));
        let batch = vec![
            (make_vector(8, 0), 0),
            (vec![1.0, 2.0], 1),
            (make_vector(8, 2), 2),
            (vec![f32::NAN; 8], 3),
        ];
        let report = index.add_batch(batch);
        assert_eq!(report.ids.len(), 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(index.len(), 2);
    }

    // ── Persistence ─────────────────────────────────────────────────────

    #[test]
    fn test_serialize_restore_search_equality() {
        let index = filled_index(40, 8, 16);
        let blob = index.to_bytes().unwrap();
        let restored: CombinedIndex<String> = CombinedIndex::from_bytes(&blob).unwrap();

        for seed in [0, 7, 100, 200] {
            let query = make_vector(8, seed);
            let before = index.search(&query, 10, &SearchOptions::default()).unwrap();
            let after = restored
                .search(&query, 10, &SearchOptions::default())
                .unwrap();
            let before_ids: Vec<(u64, f32)> = before.iter().map(|h| (h.id, h.distance)).collect();
            let after_ids: Vec<(u64, f32)> = after.iter().map(|h| (h.id, h.distance)).collect();
            assert_eq!(before_ids, after_ids);
        }
    }

    #[test]
    fn test_restore_rejects_corrupt_blob() {
        let index = filled_index(20, 8, 16);
        let mut blob = index.to_bytes().unwrap();
        let mid = blob.len() / 2;
        blob[mid] ^= 0xFF;
        assert!(CombinedIndex::<String>::from_bytes(&blob).is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.pxi");
        let index = filled_index(20, 8, 16);
        index.save(&path).unwrap();
        let restored: CombinedIndex<String> = CombinedIndex::load(&path).unwrap();
        assert_eq!(restored.len(), 20);
        assert!(restored.is_trained());
    }

    // ── Scenario: orthonormal basis ─────────────────────────────────────

    #[test]
    fn test_orthonormal_basis_query() {
        let index: CombinedIndex<usize> = CombinedIndex::new(small_config(100));
        for i in 0..4 {
            let mut basis = vec![0.0f32; 4];
            basis[i] = 1.0;
            index.add(basis, i).unwrap();
        }

        // First basis vector plus small noise along the second axis.
        let query = vec![1.0, 0.01, 0.0, 0.0];
        let hits = index.search(&query, 4, &SearchOptions::default()).unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].id, 0);
        assert!((hits[0].distance - 0.01).abs() < 1e-4);
        // The perturbed axis is slightly closer than the untouched ones.
        assert_eq!(hits[1].id, 1);
        assert!(hits[1].distance < hits[2].distance);
    }

    // ── Recall ──────────────────────────────────────────────────────────

    #[test]
    fn test_recall_does_not_decrease_with_ef() {
        let dim = 64;
        let n = 1000;
        let k = 10;
        let index = filled_index(n, dim, 200);
        assert!(index.is_trained());

        let queries: Vec<Vec<f32>> = (0..20).map(|i| make_vector(dim, 5000 + i)).collect();

        let recall_at = |ef: usize| -> f64 {
            let data = index.data.read();
            let metric = data.hnsw.config.distance_metric;
            let mut total = 0usize;
            for query in &queries {
                // Exact baseline by linear scan over all live vectors.
                let mut exact: Vec<(f32, u64)> = (0..n)
                    .map(|i| (metric.distance(query, &make_vector(dim, i)), i as u64))
                    .collect();
                exact.sort_by(|a, b| a.partial_cmp(b).unwrap());
                let truth: HashSet<u64> = exact.iter().take(k).map(|&(_, id)| id).collect();

                let options = SearchOptions {
                    ef: Some(ef),
                    ..SearchOptions::default()
                };
                let hits = data.search(query, k, &options).unwrap();
                total += hits.iter().filter(|h| truth.contains(&h.id)).count();
            }
            total as f64 / (queries.len() * k) as f64
        };

        let low = recall_at(20);
        let high = recall_at(200);
        assert!(
            high + 1e-9 >= low,
            "recall dropped when widening ef: {low} -> {high}"
        );
        assert!(high > 0.8, "ef=200 recall unexpectedly low: {high}");
    }
}
