//! Snapshot framing and disk persistence.

/// Versioned, CRC-checked snapshot codec and file helpers.
pub mod persistence;

pub use persistence::{decode_blob, encode_blob, load_blob, save_blob};
