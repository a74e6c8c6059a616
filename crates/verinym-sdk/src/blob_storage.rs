//! Local-filesystem tails storage. Files are named by their hash under a
//! configured base directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorCode, SdkError, SdkResult};
use crate::revocation::{tails_hash, Tails};

pub const DEFAULT_BLOB_STORAGE_TYPE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailsStorageConfig {
    pub base_dir: PathBuf,
}

impl TailsStorageConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Config that reads the directory a published tails location points into.
    pub fn for_location(tails_location: &str) -> Self {
        let dir = Path::new(tails_location)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { base_dir: dir }
    }

    fn path_for(&self, hash: &str) -> SdkResult<PathBuf> {
        if hash.is_empty() || hash.contains(['/', '\\', '.']) {
            return Err(SdkError::invalid_structure(format!("invalid tails hash {:?}", hash)));
        }
        Ok(self.base_dir.join(hash))
    }
}

pub fn check_storage_type(storage_type: &str) -> SdkResult<()> {
    if storage_type != DEFAULT_BLOB_STORAGE_TYPE {
        return Err(SdkError::invalid_structure(format!(
            "unsupported blob storage type {}",
            storage_type
        )));
    }
    Ok(())
}

/// Write tails under their hash; returns `(location, hash)`.
pub async fn write_tails(config: &TailsStorageConfig, tails: &Tails) -> SdkResult<(String, String)> {
    let hash = tails.hash();
    let path = config.path_for(&hash)?;
    tokio::fs::create_dir_all(&config.base_dir)
        .await
        .map_err(|e| SdkError::io(format!("{}: {}", config.base_dir.display(), e)))?;
    tokio::fs::write(&path, tails.as_bytes())
        .await
        .map_err(|e| SdkError::io(format!("{}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), size = tails.as_bytes().len(), "tails file written");
    Ok((path.to_string_lossy().into_owned(), hash))
}

/// Read the tails with `expected_hash` and check the content still hashes to it.
pub async fn read_tails(config: &TailsStorageConfig, expected_hash: &str) -> SdkResult<Tails> {
    let path = config.path_for(expected_hash)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| SdkError::io(format!("tails file {}: {}", path.display(), e)))?;
    let actual = tails_hash(&bytes);
    if actual != expected_hash {
        return Err(SdkError::new(
            ErrorCode::TailsMismatch,
            format!(
                "tails file {} hashes to {}, expected {}",
                path.display(),
                actual,
                expected_hash
            ),
        ));
    }
    Tails::from_bytes(bytes)
}
