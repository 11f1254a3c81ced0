//! # Reconciler
//!
//! Deletes local files the index no longer knows about, typically items
//! removed from the remote library since they were downloaded.
//!
//! The index is taken as authoritative. Run against a partial index, this
//! deletes files a later indexing pass would have brought back; by default the
//! reconciler therefore refuses to run before a complete scan has stored a
//! watermark.

use core_library::MediaRepository;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};

/// Counters for one reconcile run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub scanned: u64,
    pub kept: u64,
    pub deleted: u64,
    /// Hidden and sidecar files left alone
    pub skipped: u64,
    /// Orphans that could not be removed
    pub failed: u64,
}

/// A regular file below the media folder
#[derive(Debug)]
struct LocalFile {
    path: PathBuf,
    /// Folder relative to the mirror root, `/`-separated
    relative_folder: String,
    filename: String,
}

/// Removes orphaned files from the mirror
pub struct Reconciler {
    store: Arc<dyn MediaRepository>,
    root: PathBuf,
    media_folder: String,
    require_watermark: bool,
    cancellation: CancellationToken,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn MediaRepository>,
        root: impl Into<PathBuf>,
        media_folder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            root: root.into(),
            media_folder: media_folder.into(),
            require_watermark: true,
            cancellation: CancellationToken::new(),
        }
    }

    /// Allow reconciling against an index that never completed a full scan
    pub fn allow_unscanned_index(mut self) -> Self {
        self.require_watermark = false;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Delete every file under the media folder without an index record.
    ///
    /// # Errors
    ///
    /// - [`SyncError::IndexNotReady`] when no full scan has completed yet
    /// - [`SyncError::Store`] when a lookup fails
    /// - [`SyncError::Io`] when the media folder cannot be walked
    /// - [`SyncError::Cancelled`] when the token fires
    #[instrument(skip(self), fields(root = %self.root.display(), media_folder = %self.media_folder))]
    pub async fn run(&self) -> Result<ReconcileStats> {
        if self.require_watermark && self.store.get_watermark().await?.is_none() {
            return Err(SyncError::IndexNotReady(
                "no complete index scan recorded; run the indexer first".to_string(),
            ));
        }

        let media_root = self.root.join(&self.media_folder);
        let mut stats = ReconcileStats::default();

        if !tokio::fs::try_exists(&media_root).await? {
            info!(path = %media_root.display(), "Media folder does not exist, nothing to reconcile");
            return Ok(stats);
        }

        let root = self.root.clone();
        let (files, skipped) = tokio::task::spawn_blocking(move || collect_files(&root, &media_root))
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))??;
        stats.skipped = skipped;

        info!(files = files.len(), "Reconciling local files against index");

        for file in files {
            if self.cancellation.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            stats.scanned += 1;

            if self
                .store
                .get_by_path(&file.relative_folder, &file.filename)
                .await?
                .is_some()
            {
                stats.kept += 1;
                continue;
            }

            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => {
                    warn!(path = %file.path.display(), "Deleted orphaned file");
                    stats.deleted += 1;
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Failed to delete orphaned file");
                    stats.failed += 1;
                }
            }
        }

        info!(
            scanned = stats.scanned,
            kept = stats.kept,
            deleted = stats.deleted,
            "Reconcile complete"
        );

        Ok(stats)
    }
}

/// Hidden files and the engine's own sidecars
fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name.starts_with("gphotos")
}

/// Walk `media_root` and return its regular files plus the number skipped
fn collect_files(root: &Path, media_root: &Path) -> Result<(Vec<LocalFile>, u64)> {
    let mut files = Vec::new();
    let mut skipped = 0u64;

    let walker = WalkDir::new(media_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            SyncError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if is_ignored(&name) {
            skipped += 1;
            continue;
        }

        let Some(relative_folder) = entry
            .path()
            .parent()
            .and_then(|parent| parent.strip_prefix(root).ok())
            .map(folder_key)
        else {
            debug!(path = %entry.path().display(), "Skipping file outside the mirror root");
            skipped += 1;
            continue;
        };

        files.push(LocalFile {
            path: entry.path().to_path_buf(),
            relative_folder,
            filename: name,
        });
    }

    Ok((files, skipped))
}

/// Store key of a folder: its components joined with `/`
fn folder_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
