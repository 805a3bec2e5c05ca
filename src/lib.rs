//! # proxima
//!
//! Embeddable approximate nearest neighbor engine with HNSW graph search,
//! delta product quantization (DeltaPQ), and LRU-paged partitions for
//! indices larger than memory.
//!
//! This is a pure library crate with no async runtime, suitable for
//! embedding directly in applications or behind a server layer of the
//! caller's choosing. Persistence beyond the built-in snapshot files is
//! delegated to caller-supplied [`index::PartitionStore`] implementations.

/// Global configuration constants: defaults and tuning parameters.
pub mod config;
/// Crate-wide error taxonomy.
pub mod error;
/// Dual-ended priority queue used as search frontier and bounded result collector.
pub mod heap;
/// HNSW approximate nearest neighbor index: graph store, insertion, search, distance metrics.
pub mod hnsw;
/// High-level indices: the combined DeltaPQ+HNSW index and the partition manager.
pub mod index;
/// DeltaPQ vector compression: learned center plus per-subvector k-means codebooks.
pub mod quantization;
/// Versioned snapshot blobs and atomic disk persistence.
pub mod storage;

pub use error::IndexError;
pub use hnsw::{DistanceMetric, HnswConfig, HnswIndex};
pub use index::{CombinedConfig, CombinedIndex, PartitionConfig, PartitionManager, SearchOptions};
