//! Vector compression.

/// Delta-centered product quantization.
pub mod delta_pq;

pub use delta_pq::{DeltaPq, DeltaPqCodebook, DeltaPqConfig, TrainingStats};
