//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search,
//! distance metric, search tolerances). [`HnswIndex`] stores the graph using
//! a Struct-of-Arrays layout: one contiguous f32 arena for vectors plus
//! parallel arrays for adjacency, layer assignments, and tombstones. Nodes
//! reference each other only by dense `u32` id, never by pointer.

use crate::config;
use crate::error::IndexError;
use crate::hnsw::cache::DistanceCache;
use crate::hnsw::distance::{validate_vector, DistanceMetric};
use serde::{Deserialize, Serialize};

/// Configuration parameters for an HNSW index. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (except layer 0, which uses `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Distance function for similarity computation.
    pub distance_metric: DistanceMetric,
    /// When true, vectors are normalized to unit length on insert and query.
    #[serde(default)]
    pub normalize_vectors: bool,
    /// Search admission tolerance on layers above 0 (1.0 = strict best-first).
    pub search_tolerance: f32,
    /// Search admission tolerance on layer 0. Values above 1.0 admit
    /// candidates slightly worse than the current worst retained result.
    pub search_tolerance_base: f32,
    /// When pruning an over-capacity neighbor list, reserve slots for the
    /// freshly added candidates before refilling with the closest survivors.
    #[serde(default)]
    pub prefer_new_edges: bool,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            distance_metric: DistanceMetric::Euclidean,
            normalize_vectors: false,
            search_tolerance: config::HNSW_DEFAULT_SEARCH_TOLERANCE,
            search_tolerance_base: config::HNSW_DEFAULT_SEARCH_TOLERANCE_BASE,
            prefer_new_edges: false,
        }
    }
}

/// Estimated memory footprint of an index.
#[derive(Debug, Clone, Copy)]
pub struct MemoryStats {
    pub vector_bytes: usize,
    pub graph_bytes: usize,
    pub node_count: usize,
    pub live_count: usize,
}

/// HNSW index using Struct-of-Arrays layout for cache-friendly access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    pub config: HnswConfig,
    /// Vector arena: `node_count * dimension` floats, contiguous.
    pub vectors: Vec<f32>,
    /// Adjacency: `[node_id][layer][neighbor_ids]`.
    pub neighbors: Vec<Vec<Vec<u32>>>,
    pub layers: Vec<u8>,
    pub deleted: Vec<bool>,
    pub entry_point: Option<u32>,
    pub max_layer: usize,
    pub dimension: usize,
    pub node_count: u32,
    /// Tombstoned node count, kept in sync by `remove` so `len()` is O(1).
    #[serde(default)]
    pub deleted_count: u32,
}

impl HnswIndex {
    /// Creates a new empty HNSW index with the given dimension and configuration.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self {
            config,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            layers: Vec::new(),
            deleted: Vec::new(),
            entry_point: None,
            max_layer: 0,
            dimension,
            node_count: 0,
            deleted_count: 0,
        }
    }

    /// Creates a new empty index with default configuration (euclidean, M=16).
    pub fn with_default_config(dimension: usize) -> Self {
        Self::new(dimension, HnswConfig::default())
    }

    /// Returns the number of non-deleted nodes in the index. O(1).
    pub fn len(&self) -> usize {
        (self.node_count - self.deleted_count) as usize
    }

    /// Returns `true` if the index contains no non-deleted nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate a random layer for a new node using an exponential
    /// distribution: `floor(-ln(U) * mL)` with `mL = 1/ln(M)`, capped at
    /// `max_layers - 1`. Most nodes land on layer 0.
    pub fn random_level(&self) -> usize {
        let ml = 1.0 / (self.config.m as f64).ln();
        let r: f64 = rand::random::<f64>().max(f64::MIN_POSITIVE);
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.config.max_layers - 1)
    }

    /// Vector slice for a node. O(1) view into the contiguous arena.
    #[inline]
    pub fn vector_of(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Returns `true` if the node has been tombstoned.
    #[inline]
    pub fn is_deleted(&self, id: u32) -> bool {
        self.deleted[id as usize]
    }

    /// Layer assignment of a node.
    #[inline]
    pub fn layer_of(&self, id: u32) -> u8 {
        self.layers[id as usize]
    }

    /// Neighbor list of a node at a layer (empty if the node does not reach
    /// that layer).
    pub fn neighbors_of(&self, id: u32, layer: usize) -> &[u32] {
        self.neighbors
            .get(id as usize)
            .and_then(|per_layer| per_layer.get(layer))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Distance between two stored nodes under the configured metric.
    #[inline]
    pub fn node_distance(&self, a: u32, b: u32) -> f32 {
        self.config
            .distance_metric
            .distance(self.vector_of(a), self.vector_of(b))
    }

    /// Distance from an external query to a stored node.
    #[inline]
    pub fn query_distance(&self, query: &[f32], id: u32) -> f32 {
        self.config
            .distance_metric
            .distance(query, self.vector_of(id))
    }

    /// Append a node's storage (vector, adjacency slots, layer, tombstone
    /// flag). The new node's id is the previous `node_count`.
    pub(crate) fn push_node(&mut self, vector: &[f32], level: usize) -> u32 {
        let id = self.node_count;
        self.vectors.extend_from_slice(vector);
        let mut per_layer = Vec::with_capacity(level + 1);
        for _ in 0..=level {
            per_layer.push(Vec::new());
        }
        self.neighbors.push(per_layer);
        self.layers.push(level as u8);
        self.deleted.push(false);
        self.node_count += 1;
        id
    }

    /// Insert candidate edges `node -> candidates` at a layer and prune the
    /// node's list back to `max_degree`.
    ///
    /// Self-references, duplicate edges, and deleted or out-of-range ids are
    /// filtered out. Pruning keeps the `max_degree` closest neighbors with
    /// ties broken by ascending id; in `prefer_new` mode the fresh candidates
    /// claim slots first and the closest survivors fill the rest.
    pub fn add_edges(
        &mut self,
        node: u32,
        candidates: &[u32],
        layer: usize,
        max_degree: usize,
        prefer_new: bool,
        cache: &mut DistanceCache,
    ) {
        let nid = node as usize;
        while self.neighbors[nid].len() <= layer {
            self.neighbors[nid].push(Vec::new());
        }

        let existing = self.neighbors[nid][layer].clone();
        let mut fresh: Vec<u32> = Vec::with_capacity(candidates.len());
        for &c in candidates {
            if c == node || c >= self.node_count || self.deleted[c as usize] {
                continue;
            }
            if existing.contains(&c) || fresh.contains(&c) {
                continue;
            }
            fresh.push(c);
        }
        if fresh.is_empty() {
            return;
        }

        if existing.len() + fresh.len() <= max_degree {
            self.neighbors[nid][layer].extend_from_slice(&fresh);
            return;
        }

        let measure = |ids: &[u32], cache: &mut DistanceCache| -> Vec<(f32, u32)> {
            let mut out: Vec<(f32, u32)> = ids
                .iter()
                .map(|&c| (cache.distance_between(node, c, || self.node_distance(node, c)), c))
                .collect();
            out.sort_unstable_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            out
        };

        let kept: Vec<u32> = if prefer_new {
            let fresh_sorted = measure(&fresh, cache);
            let existing_sorted = measure(&existing, cache);
            let mut kept: Vec<u32> = fresh_sorted
                .iter()
                .take(max_degree)
                .map(|&(_, c)| c)
                .collect();
            for &(_, c) in &existing_sorted {
                if kept.len() >= max_degree {
                    break;
                }
                kept.push(c);
            }
            kept
        } else {
            let mut all = existing;
            all.extend_from_slice(&fresh);
            measure(&all, cache)
                .into_iter()
                .take(max_degree)
                .map(|(_, c)| c)
                .collect()
        };

        self.neighbors[nid][layer] = kept;
    }

    /// Tombstone a node. Returns `false` for unknown or already-deleted ids.
    ///
    /// The node stays in the adjacency lists so other nodes' search paths
    /// keep working; it is excluded from all query results. If the entry
    /// point dies, the highest-layer live node takes over.
    pub fn remove(&mut self, id: u32) -> bool {
        if id >= self.node_count || self.deleted[id as usize] {
            return false;
        }
        self.deleted[id as usize] = true;
        self.deleted_count += 1;

        if self.entry_point == Some(id) {
            self.recompute_entry_point();
        }
        true
    }

    /// Scan live nodes for the highest-layer survivor and make it the entry
    /// point. Clears the entry point when no live node remains.
    fn recompute_entry_point(&mut self) {
        let mut best: Option<(u8, u32)> = None;
        for cand in 0..self.node_count {
            if self.deleted[cand as usize] {
                continue;
            }
            let layer = self.layers[cand as usize];
            match best {
                Some((best_layer, _)) if layer <= best_layer => {}
                _ => best = Some((layer, cand)),
            }
        }
        match best {
            Some((layer, cand)) => {
                self.entry_point = Some(cand);
                self.max_layer = layer as usize;
            }
            None => {
                self.entry_point = None;
                self.max_layer = 0;
            }
        }
    }

    /// Validate a vector against this index's dimension (set on first insert).
    pub fn check_vector(&self, vector: &[f32]) -> Result<(), IndexError> {
        let expected = if self.node_count == 0 {
            vector.len()
        } else {
            self.dimension
        };
        validate_vector(vector, expected)
    }

    /// Estimated memory footprint.
    pub fn memory_stats(&self) -> MemoryStats {
        let graph_bytes: usize = self
            .neighbors
            .iter()
            .flat_map(|per_layer| per_layer.iter())
            .map(|l| l.len() * std::mem::size_of::<u32>())
            .sum();
        MemoryStats {
            vector_bytes: self.vectors.len() * std::mem::size_of::<f32>(),
            graph_bytes,
            node_count: self.node_count as usize,
            live_count: self.len(),
        }
    }

    /// Structural invariant check, run after deserialization.
    pub fn validate(&self) -> Result<(), String> {
        let nc = self.node_count as usize;
        if self.vectors.len() != nc * self.dimension {
            return Err(format!(
                "vector arena length {} != node_count({nc}) * dimension({})",
                self.vectors.len(),
                self.dimension
            ));
        }
        if self.neighbors.len() != nc {
            return Err(format!("neighbors length {} != node_count {nc}", self.neighbors.len()));
        }
        if self.layers.len() != nc {
            return Err(format!("layers length {} != node_count {nc}", self.layers.len()));
        }
        if self.deleted.len() != nc {
            return Err(format!("deleted length {} != node_count {nc}", self.deleted.len()));
        }
        let tombstones = self.deleted.iter().filter(|&&d| d).count();
        if tombstones != self.deleted_count as usize {
            return Err(format!(
                "deleted_count {} != {tombstones} tombstoned nodes",
                self.deleted_count
            ));
        }
        if let Some(ep) = self.entry_point {
            if ep as usize >= nc {
                return Err(format!("entry_point {ep} >= node_count {nc}"));
            }
        } else if self.deleted.iter().any(|&d| !d) {
            return Err("no entry point despite live nodes".into());
        }
        for (node_id, per_layer) in self.neighbors.iter().enumerate() {
            for (layer, list) in per_layer.iter().enumerate() {
                let max_degree = if layer == 0 {
                    self.config.m_max0
                } else {
                    self.config.m
                };
                if list.len() > max_degree {
                    return Err(format!(
                        "node {node_id} layer {layer} degree {} exceeds {max_degree}",
                        list.len()
                    ));
                }
                for &neighbor in list {
                    if neighbor as usize >= nc {
                        return Err(format!(
                            "neighbor {neighbor} out of bounds (node_count={nc}) at node {node_id} layer {layer}"
                        ));
                    }
                    if neighbor as usize == node_id {
                        return Err(format!("node {node_id} lists itself at layer {layer}"));
                    }
                }
            }
        }
        Ok(())
    }
}
