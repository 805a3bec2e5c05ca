//! Snapshot encoding and disk persistence.
//!
//! Snapshots are bincode payloads framed by a versioned header and a CRC32
//! footer: `[magic "PXI1"][u16 version BE][payload][magic "PXC1"][u32 CRC32 BE]`.
//! The CRC covers header and payload. File writes use atomic temp-file +
//! rename so a crash mid-write never leaves a truncated snapshot in place.

use crate::error::IndexError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Magic bytes opening every snapshot.
const SNAPSHOT_MAGIC: &[u8; 4] = b"PXI1";
/// Magic bytes preceding the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"PXC1";
/// Current snapshot format version.
const SNAPSHOT_VERSION: u16 = 1;

/// Serialize a value into the framed snapshot format.
pub fn encode_blob<T: Serialize>(value: &T) -> Result<Vec<u8>, IndexError> {
    let payload = bincode::serialize(value)?;

    let mut out = Vec::with_capacity(payload.len() + 14);
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.extend_from_slice(&SNAPSHOT_VERSION.to_be_bytes());
    out.extend_from_slice(&payload);

    let crc = crc32fast::hash(&out);
    out.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    out.extend_from_slice(&crc.to_be_bytes());
    Ok(out)
}

/// Decode a framed snapshot, verifying magic, version, and CRC32.
pub fn decode_blob<T: DeserializeOwned>(raw: &[u8]) -> Result<T, IndexError> {
    if raw.len() < 14 {
        return Err(IndexError::CorruptState(format!(
            "snapshot too short: {} bytes",
            raw.len()
        )));
    }
    if &raw[..4] != SNAPSHOT_MAGIC {
        return Err(IndexError::CorruptState(
            "snapshot magic bytes missing".into(),
        ));
    }
    let version = u16::from_be_bytes([raw[4], raw[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(IndexError::CorruptState(format!(
            "unsupported snapshot version {version} (expected {SNAPSHOT_VERSION})"
        )));
    }

    let footer_at = raw.len() - 8;
    if &raw[footer_at..footer_at + 4] != SNAPSHOT_CRC_MAGIC {
        return Err(IndexError::CorruptState(
            "snapshot CRC footer missing".into(),
        ));
    }
    let stored_crc = u32::from_be_bytes([
        raw[footer_at + 4],
        raw[footer_at + 5],
        raw[footer_at + 6],
        raw[footer_at + 7],
    ]);
    let computed_crc = crc32fast::hash(&raw[..footer_at]);
    if computed_crc != stored_crc {
        return Err(IndexError::CorruptState(format!(
            "snapshot CRC32 mismatch: expected {stored_crc:#010x}, got {computed_crc:#010x}"
        )));
    }

    Ok(bincode::deserialize(&raw[6..footer_at])?)
}

/// Write a snapshot to disk atomically (temp file, then rename).
pub fn save_blob<T: Serialize>(value: &T, path: &Path) -> Result<(), IndexError> {
    let bytes = encode_blob(value)?;

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
            }
        }
    }

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp_path, path)?;

    tracing::info!("saved snapshot {:?} ({} bytes)", path, bytes.len());
    Ok(())
}

/// Read and decode a snapshot from disk.
pub fn load_blob<T: DeserializeOwned>(path: &Path) -> Result<T, IndexError> {
    let raw = fs::read(path)?;
    let value = decode_blob(&raw)?;
    tracing::info!("loaded snapshot {:?} ({} bytes)", path, raw.len());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<f32>,
    }

    fn sample() -> Sample {
        Sample {
            name: "snapshot".into(),
            values: vec![1.0, 2.5, -3.0],
        }
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let blob = encode_blob(&sample()).unwrap();
        let restored: Sample = decode_blob(&blob).unwrap();
        assert_eq!(restored, sample());
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let mut blob = encode_blob(&sample()).unwrap();
        let mid = blob.len() / 2;
        blob[mid] ^= 0xFF;
        let result: Result<Sample, _> = decode_blob(&blob);
        assert!(matches!(result, Err(IndexError::CorruptState(_))));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let blob = encode_blob(&sample()).unwrap();
        let result: Result<Sample, _> = decode_blob(&blob[..blob.len() - 3]);
        assert!(result.is_err());
        let result: Result<Sample, _> = decode_blob(&blob[..5]);
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut blob = encode_blob(&sample()).unwrap();
        blob[0] = b'X';
        let result: Result<Sample, _> = decode_blob(&blob);
        assert!(matches!(result, Err(IndexError::CorruptState(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut blob = encode_blob(&sample()).unwrap();
        blob[5] = 99;
        let result: Result<Sample, _> = decode_blob(&blob);
        assert!(matches!(result, Err(IndexError::CorruptState(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.pxi");
        save_blob(&sample(), &path).unwrap();
        let restored: Sample = load_blob(&path).unwrap();
        assert_eq!(restored, sample());
        // No temp file left behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Sample, _> = load_blob(&dir.path().join("absent.pxi"));
        assert!(matches!(result, Err(IndexError::Persistence(_))));
    }
}
