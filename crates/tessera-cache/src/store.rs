//! Filesystem-backed cache store.

use crate::archive;
use crate::keys::sanitize;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tessera_core::Result;
use tessera_core::cache::{EntryMeta, RestoreOutcome, SaveReceipt};
use tessera_core::ports::CacheStore;
use tracing::{debug, info};

/// Store keeping one archive plus a metadata sidecar per key.
///
/// Writes go straight to the entry path: concurrent saves under a colliding
/// key are last-writer-wins, which the scheduling model accepts since cache
/// content is advisory. Entries are never evicted here; retention belongs
/// to whatever owns the directory.
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{}.tar.gz", sanitize(key)))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root_dir.join(format!("{}.json", sanitize(key)))
    }
}

#[async_trait]
impl CacheStore for FilesystemStore {
    async fn restore(&self, key: &str, dest: &Path) -> Result<RestoreOutcome> {
        let start = std::time::Instant::now();
        let entry_path = self.entry_path(key);

        if !entry_path.exists() {
            debug!(key, "cache miss");
            return Ok(RestoreOutcome::miss(start.elapsed().as_millis() as u64));
        }

        let bytes = tokio::fs::read(&entry_path)
            .await
            .map_err(|e| tessera_core::Error::CacheStore(format!("Failed to read entry: {}", e)))?;

        let dest = dest.to_path_buf();
        let unpack_bytes = bytes.clone();
        tokio::task::spawn_blocking(move || archive::unpack(unpack_bytes.as_slice(), &dest))
            .await
            .map_err(|e| tessera_core::Error::Internal(e.to_string()))??;

        let entry = match tokio::fs::read(self.meta_path(key)).await {
            Ok(meta_bytes) => serde_json::from_slice(&meta_bytes)?,
            // Sidecar lost; rebuild what we can from the archive itself.
            Err(_) => EntryMeta {
                key: key.to_string(),
                size_bytes: bytes.len() as u64,
                checksum: hex::encode(Sha256::digest(&bytes)),
                created_at: chrono::Utc::now(),
            },
        };

        debug!(key, size_bytes = entry.size_bytes, "cache hit");
        Ok(RestoreOutcome {
            hit: true,
            entry: Some(entry),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn save(&self, key: &str, paths: &[PathBuf], base: &Path) -> Result<SaveReceipt> {
        let start = std::time::Instant::now();

        tokio::fs::create_dir_all(&self.root_dir)
            .await
            .map_err(|e| {
                tessera_core::Error::CacheStore(format!("Failed to create cache dir: {}", e))
            })?;

        let paths = paths.to_vec();
        let base = base.to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut buf = Vec::new();
            archive::pack(&mut buf, &paths, &base)?;
            Ok(buf)
        })
        .await
        .map_err(|e| tessera_core::Error::Internal(e.to_string()))??;

        let entry_path = self.entry_path(key);
        let replaced = entry_path.exists();

        let entry = EntryMeta {
            key: key.to_string(),
            size_bytes: bytes.len() as u64,
            checksum: hex::encode(Sha256::digest(&bytes)),
            created_at: chrono::Utc::now(),
        };

        tokio::fs::write(&entry_path, &bytes)
            .await
            .map_err(|e| tessera_core::Error::CacheStore(format!("Failed to write entry: {}", e)))?;
        tokio::fs::write(self.meta_path(key), serde_json::to_vec(&entry)?)
            .await
            .map_err(|e| tessera_core::Error::CacheStore(format!("Failed to write meta: {}", e)))?;

        info!(key, size_bytes = entry.size_bytes, replaced, "cache saved");
        Ok(SaveReceipt {
            entry,
            replaced,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
