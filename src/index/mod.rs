//! High-level index surfaces built on the HNSW graph.

/// HNSW plus DeltaPQ with a training buffer and stable external ids.
pub mod combined;
/// Size-capped partitions with LRU residency and pluggable persistence.
pub mod partition;

pub use combined::{
    AddBatchReport, CombinedConfig, CombinedIndex, CombinedIndexData, SearchOptions, SearchResult,
};
pub use partition::{
    DirectoryStore, PartitionBlob, PartitionConfig, PartitionManager, PartitionMeta,
    PartitionStore,
};
