//! Artifact cache
//!
//! One file per artifact under the cache root, named by its sanitized local
//! name. `ensure_local` only fetches what is missing; `sync_all` always
//! refreshes. Writes go through write-then-rename, so concurrent callers for
//! the same artifact at worst rewrite identical bytes.

use crate::catalog::{ArtifactEntry, Catalog};
use crate::error::{LaunchpadError, Result};
use crate::fetcher::RemoteFetcher;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Receives bulk sync progress
pub trait ProgressSink: Send + Sync {
    /// Fraction of items processed so far, in (0, 1]
    fn on_progress(&self, fraction: f64) {
        let _ = fraction;
    }

    /// One item failed; the batch continues
    fn on_failure(&self, entry: &ArtifactEntry, error: &LaunchpadError) {
        let _ = (entry, error);
    }
}

impl ProgressSink for () {}

/// Outcome of a bulk sync
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub total: usize,
    pub succeeded: Vec<ArtifactEntry>,
    pub failed: Vec<(ArtifactEntry, String)>,
    /// Discovered remote files that were not added (logical path, reason)
    pub skipped: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Local artifact store backed by a remote fetcher
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
    fetcher: RemoteFetcher,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>, fetcher: RemoteFetcher) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    pub fn path_for(&self, entry: &ArtifactEntry) -> PathBuf {
        self.root.join(&entry.local_name)
    }

    pub fn is_cached(&self, entry: &ArtifactEntry) -> bool {
        self.path_for(entry).exists()
    }

    /// Modification time of the cached file, if present
    pub fn cached_at(&self, entry: &ArtifactEntry) -> Option<SystemTime> {
        fs::metadata(self.path_for(entry))
            .and_then(|m| m.modified())
            .ok()
    }

    /// Create the cache root if missing; never removes it
    pub fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)
                .map_err(|e| LaunchpadError::filesystem(&self.root, e))?;
        }
        Ok(())
    }

    /// Path of the artifact on disk, fetching it first if absent
    ///
    /// An existing file is returned as is; staleness is only resolved by a
    /// bulk sync.
    pub async fn ensure_local(&self, entry: &ArtifactEntry) -> Result<PathBuf> {
        self.ensure_root()?;
        let dest = self.path_for(entry);
        if self.is_cached(entry) {
            debug!("Cache hit: {}", dest.display());
            return Ok(dest);
        }

        info!(
            "Local file missing for {}, fetching now",
            entry.logical_path
        );
        match self.fetcher.download(&entry.logical_path, &dest).await {
            Ok(bytes) => {
                info!("Fetched {} ({} bytes)", entry.local_name, bytes);
                Ok(dest)
            }
            Err(e) => {
                warn!("Could not fetch {}: {}", entry.logical_path, e);
                Err(e)
            }
        }
    }

    /// Refresh every entry unconditionally, continuing past failures
    pub async fn sync_all(&self, entries: &[ArtifactEntry], sink: &dyn ProgressSink) -> SyncReport {
        let total = entries.len();
        let mut report = SyncReport {
            total,
            ..SyncReport::default()
        };
        if total == 0 {
            warn!("No artifacts listed for sync; check the configuration");
            return report;
        }
        if let Err(e) = self.ensure_root() {
            warn!("{}", e);
        }

        info!("Starting sync of {} artifacts", total);
        for (idx, entry) in entries.iter().enumerate() {
            let dest = self.path_for(entry);
            debug!("Download: {} -> {}", entry.logical_path, dest.display());
            match self.fetcher.download(&entry.logical_path, &dest).await {
                Ok(bytes) => {
                    info!("Downloaded {} ({} bytes)", entry.local_name, bytes);
                    report.succeeded.push(entry.clone());
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", entry.logical_path, e);
                    sink.on_failure(entry, &e);
                    report.failed.push((entry.clone(), e.to_string()));
                }
            }
            sink.on_progress((idx + 1) as f64 / total as f64);
        }

        info!(
            "Sync finished: {} ok, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    /// List the given remote folders, merge with the catalog, then sync all
    pub async fn discover_and_sync(
        &self,
        catalog: &Catalog,
        folders: &[String],
        sink: &dyn ProgressSink,
    ) -> SyncReport {
        let mut discovered = Vec::new();
        for folder in folders {
            let names = self.fetcher.list_remote_folder(folder).await;
            debug!("Folder {} lists {} files", folder, names.len());
            discovered.extend(names.into_iter().map(|name| (folder.clone(), name)));
        }

        let (entries, skipped) = catalog.with_discovered(&discovered);
        for (path, reason) in &skipped {
            warn!("Skipping discovered {}: {}", path, reason);
        }

        let mut report = self.sync_all(&entries, sink).await;
        report.skipped = skipped;
        report
    }
}
