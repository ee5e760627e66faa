//! Download directory management for the backend server
//!
//! Processed media is written to a single flat directory under random names and deleted
//! again once it is older than the configured retention.

use crate::error::{Error, Result};
use crate::types::MediaFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SAVE_ATTEMPTS: usize = 16;

/// Flat directory of processed downloads
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under a fresh `tiktok_<8 hex>.<ext>` name and return that name
    ///
    /// Existing files are never overwritten; a name collision draws a new name.
    pub async fn save(&self, bytes: &[u8], format: MediaFormat) -> Result<String> {
        self.save_as(bytes, || {
            format!("tiktok_{:08x}.{}", rand::random::<u32>(), format.extension())
        })
        .await
    }

    async fn save_as(&self, bytes: &[u8], mut next_name: impl FnMut() -> String) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for _ in 0..SAVE_ATTEMPTS {
            let filename = next_name();
            let path = self.dir.join(&filename);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    tracing::debug!(path = ?path, "download name taken, drawing another");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            tracing::info!(path = ?path, bytes = bytes.len(), "stored download");
            return Ok(filename);
        }

        Err(Error::Other(format!(
            "no free download name in {} after {SAVE_ATTEMPTS} attempts",
            self.dir.display()
        )))
    }

    /// Map a requested file name to its path inside the store
    ///
    /// Names containing path separators or `..` are rejected so a request can never
    /// leave the download directory.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename.contains("..")
            || filename.starts_with('.')
        {
            return Err(Error::BadRequest("Invalid filename".to_string()));
        }
        Ok(self.dir.join(filename))
    }

    /// Delete files last modified more than `retention` ago, returning how many were removed
    ///
    /// A missing directory counts as empty.
    pub async fn cleanup(&self, retention: Duration) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age > retention {
                let path = entry.path();
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {
                        tracing::debug!(path = ?path, age_secs = age.as_secs(), "removed expired download");
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "failed to remove expired download");
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = ?self.dir, "download cleanup finished");
        }
        Ok(removed)
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until `shutdown` is cancelled
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        retention: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            if interval.is_zero() {
                tracing::error!("download cleanup disabled, interval must be non-zero");
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("download cleanup task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.cleanup(retention).await {
                            tracing::warn!(error = %e, "download cleanup failed");
                        }
                    }
                }
            }
        })
    }
}
