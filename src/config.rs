//! Global configuration constants for proxima.
//!
//! All tuning parameters and input validation limits are defined here.
//! These are compile-time defaults; per-index values live in the config
//! structs (`HnswConfig`, `DeltaPqConfig`, `PartitionConfig`).

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// ef scale factor for candidate search on upper layers during insertion.
pub const HNSW_UPPER_LAYER_EF_SCALE: f64 = 1.2;

/// ef scale factor for candidate search on layer 0 during insertion.
///
/// Layer 0 carries most of the graph's connectivity, so the candidate
/// search there runs wider.
pub const HNSW_BASE_LAYER_EF_SCALE: f64 = 2.0;

/// Default search admission tolerance on upper layers (1.0 = strict best-first).
pub const HNSW_DEFAULT_SEARCH_TOLERANCE: f32 = 1.0;

/// Default search admission tolerance on layer 0.
///
/// Values above 1.0 admit candidates slightly worse than the current worst
/// retained result, counteracting premature convergence where most useful
/// paths live. Empirically tuned; exposed via `HnswConfig`.
pub const HNSW_DEFAULT_SEARCH_TOLERANCE_BASE: f32 = 1.05;

/// Default number of DeltaPQ subvectors per vector.
pub const PQ_DEFAULT_SUBVECTORS: usize = 8;

/// Default DeltaPQ code width in bits (8 bits = 256 centroids per subvector).
pub const PQ_DEFAULT_BITS_PER_CODE: usize = 8;

/// Maximum k-means iterations during DeltaPQ codebook training.
pub const PQ_KMEANS_ITERATIONS: usize = 25;

/// Number of buffered vectors that triggers automatic DeltaPQ training.
pub const PQ_DEFAULT_TRAINING_THRESHOLD: usize = 1000;

/// Default maximum number of vectors per partition.
pub const PARTITION_DEFAULT_SIZE: usize = 100_000;

/// Default maximum number of partitions resident in memory.
pub const PARTITION_DEFAULT_MAX_RESIDENT: usize = 5;

/// Default capacity of a distance cache (entries).
pub const DISTANCE_CACHE_DEFAULT_CAPACITY: usize = 50_000;

/// Fraction of entries dropped in one distance-cache eviction batch.
pub const DISTANCE_CACHE_EVICT_FRACTION: f64 = 0.25;

/// Default chunk size for batch insertion.
pub const INSERT_BATCH_CHUNK_SIZE: usize = 256;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: usize = 4096;
