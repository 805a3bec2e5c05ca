//! HNSW insertion algorithm.
//!
//! Inserts a vector into the graph in three phases: greedy descent from the
//! entry point to the node's assigned level, per-layer candidate search with
//! heuristic neighbor selection, then bidirectional edge creation with
//! over-capacity pruning. All edge mutations go through
//! [`HnswIndex::add_edges`].

use crate::config;
use crate::error::IndexError;
use crate::hnsw::cache::DistanceCache;
use crate::hnsw::distance::normalize;
use crate::hnsw::graph::HnswIndex;
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;

/// Outcome of a batch insertion: ids of inserted nodes plus the number of
/// malformed vectors that were skipped.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub inserted: Vec<u32>,
    pub skipped: usize,
}

impl HnswIndex {
    /// Insert a vector, allocating a fresh distance cache for this call.
    /// Returns the new node's internal id.
    pub fn insert(&mut self, vector: &[f32]) -> Result<u32, IndexError> {
        let mut cache = DistanceCache::default();
        self.insert_with_cache(vector, &mut cache)
    }

    /// Insert a vector, memoizing node-pair distances in the caller's cache.
    ///
    /// Rejects malformed vectors with `InvalidVector` before any state is
    /// mutated. The first successful insert fixes the index dimension.
    pub fn insert_with_cache(
        &mut self,
        vector: &[f32],
        cache: &mut DistanceCache,
    ) -> Result<u32, IndexError> {
        self.check_vector(vector)?;

        let mut owned;
        let vector: &[f32] = if self.config.normalize_vectors {
            owned = vector.to_vec();
            normalize(&mut owned);
            &owned
        } else {
            vector
        };

        if self.node_count == 0 {
            self.dimension = vector.len();
        }
        let level = self.random_level();

        // Empty graph (or all nodes tombstoned): the new node is the entry point.
        if self.entry_point.is_none() {
            let id = self.push_node(vector, level);
            self.entry_point = Some(id);
            self.max_layer = level;
            return Ok(id);
        }
        let entry_point = self.entry_point.unwrap_or_default();

        let mut visited = VisitedSet::new(self.node_count as usize + 1);

        // Phase 1: greedy descent through layers above the insert level,
        // keeping only the closest node as the next layer's start.
        let mut current_ep = entry_point;
        for layer in (level + 1..=self.max_layer).rev() {
            let nearest = search_layer(
                self,
                vector,
                std::slice::from_ref(&current_ep),
                1,
                layer,
                &mut visited,
                None,
            );
            if let Some(&(_, id)) = nearest.first() {
                current_ep = id;
            }
        }

        // Phase 2: per-layer candidate search and heuristic selection.
        let top = level.min(self.max_layer);
        let mut selected_per_layer: Vec<Vec<u32>> = vec![Vec::new(); level + 1];
        let mut layer_eps: Vec<u32> = vec![current_ep];
        for layer in (0..=top).rev() {
            let ef = layer_ef(self.config.ef_construction, layer);
            let candidates = search_layer(self, vector, &layer_eps, ef, layer, &mut visited, None);

            let m_max = self.max_degree(layer);
            let selected = select_neighbors_heuristic(self, &candidates, m_max, cache);
            selected_per_layer[layer] = selected;

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, id)| id));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }

        // Phase 3: materialize the node and wire both edge directions.
        let id = self.push_node(vector, level);
        let prefer_new = self.config.prefer_new_edges;
        for (layer, selected) in selected_per_layer.iter().enumerate().take(top + 1) {
            let m_max = self.max_degree(layer);
            self.add_edges(id, selected, layer, m_max, false, cache);
            for &neighbor in selected {
                self.add_edges(neighbor, &[id], layer, m_max, prefer_new, cache);
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(id);
        }
        Ok(id)
    }

    /// Insert a batch of vectors in order, sharing one distance cache.
    ///
    /// Malformed vectors are skipped and counted, never fatal. The batch is
    /// processed in chunks of `chunk_size` with `progress(done, total)`
    /// reported after each chunk; chunking does not reorder graph effects.
    pub fn insert_batch(
        &mut self,
        vectors: &[Vec<f32>],
        chunk_size: usize,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> BatchReport {
        let chunk_size = chunk_size.max(1);
        let total = vectors.len();
        let mut cache = DistanceCache::default();
        let mut report = BatchReport::default();

        for (chunk_idx, chunk) in vectors.chunks(chunk_size).enumerate() {
            for vector in chunk {
                match self.insert_with_cache(vector, &mut cache) {
                    Ok(id) => report.inserted.push(id),
                    Err(e) => {
                        tracing::debug!("skipping vector in batch: {e}");
                        report.skipped += 1;
                    }
                }
            }
            if let Some(cb) = progress {
                let done = (chunk_idx * chunk_size + chunk.len()).min(total);
                cb(done, total);
            }
        }
        report
    }

    #[inline]
    fn max_degree(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }
}

/// ef used for candidate search at a layer during construction. Layer 0
/// carries most of the connectivity and runs wider.
fn layer_ef(ef_construction: usize, layer: usize) -> usize {
    let scale = if layer == 0 {
        config::HNSW_BASE_LAYER_EF_SCALE
    } else {
        config::HNSW_UPPER_LAYER_EF_SCALE
    };
    ((ef_construction as f64 * scale) as usize).max(10)
}

/// Heuristic neighbor selection (Algorithm 4 from the HNSW paper).
///
/// A candidate is selected only if it is closer to the base node than to any
/// already-selected neighbor, which favors diverse directions over redundant
/// clusters. Remaining slots are backfilled with the closest unused
/// candidates. Pairwise node distances go through the cache.
fn select_neighbors_heuristic(
    index: &HnswIndex,
    candidates: &[(f32, u32)],
    m: usize,
    cache: &mut DistanceCache,
) -> Vec<u32> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let is_diverse = selected.iter().all(|&(_, sid)| {
            let dist_to_selected =
                cache.distance_between(cid, sid, || index.node_distance(cid, sid));
            dist_to_base <= dist_to_selected
        });
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    if selected.len() < m {
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected.iter().any(|&(_, sid)| sid == cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected.into_iter().map(|(_, id)| id).collect()
}
