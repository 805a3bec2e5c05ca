//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! A multi-layer proximity graph: every node lives on layer 0, exponentially
//! fewer reach each higher layer. Queries descend greedily from the single
//! entry point, then run a bounded best-first search on layer 0. Deletions
//! are tombstones so the remaining nodes' search paths stay connected.
//!
//! The graph uses a Struct-of-Arrays layout: one contiguous f32 arena for
//! vectors plus parallel arrays for adjacency, layer assignments, and
//! tombstone flags. Inter-node references are dense integer ids.

/// Bounded node-pair distance memoization with approximate LRU eviction.
pub mod cache;
/// Distance metrics and vector validation.
pub mod distance;
/// Graph structure, configuration, edge mutation, and tombstone removal.
pub mod graph;
/// Insertion algorithm with heuristic neighbor selection and batching.
pub mod insert;
/// Single-layer search and multi-layer KNN.
pub mod search;
/// Generation-based visited set for graph traversal.
pub mod visited;

pub use cache::DistanceCache;
pub use distance::{validate_vector, DistanceMetric};
pub use graph::{HnswConfig, HnswIndex};
pub use insert::BatchReport;
pub use search::{knn_search, search_layer};
