//! # Mirror Configuration Module
//!
//! Provides configuration management for the photo library mirror.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `MirrorConfig`
//! instance that holds every setting the sync engine reads. `build()` applies
//! defaults and fails fast with an actionable message when a value is out of range.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{parse_date, MirrorConfig};
//! use std::time::Duration;
//!
//! let config = MirrorConfig::builder()
//!     .root_folder("/srv/photos")
//!     .start_date(parse_date("2023-01-01")?)
//!     .include_video(false)
//!     .max_concurrent_downloads(8)
//!     .video_timeout(Duration::from_secs(600))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::MirrorConfig;
//!
//! // A mirror root is mandatory
//! let config = MirrorConfig::builder()
//!     .batch_size(20)
//!     .build()
//!     .expect("Should fail - missing root folder");
//! ```

use crate::error::{Error, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;

/// Default name of the SQLite index inside the mirror root
pub const DEFAULT_DATABASE_NAME: &str = "gphotos.sqlite";

/// Default media-kind subfolder under the mirror root
pub const DEFAULT_MEDIA_FOLDER: &str = "photos";

/// Upper bound imposed by the remote batch lookup endpoint
pub const MAX_BATCH_SIZE: usize = 50;

/// Upper bound imposed by the remote search/list endpoints
pub const MAX_PAGE_SIZE: u32 = 100;

/// Phases run by a full sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPhases {
    /// Discover remote items and update the index
    pub index: bool,
    /// Download content for indexed items
    pub download: bool,
    /// Delete local files that are no longer indexed
    pub reconcile: bool,
}

impl Default for SyncPhases {
    fn default() -> Self {
        Self {
            index: true,
            download: true,
            reconcile: false,
        }
    }
}

/// Configuration for the photo library mirror.
///
/// Use [`MirrorConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Root of the local mirror
    pub root_folder: PathBuf,

    /// Path to the SQLite index
    pub database_path: PathBuf,

    /// Media subfolder under the root (year/month folders live below it)
    pub media_folder: String,

    /// Only consider items created on or after this date
    pub start_date: Option<NaiveDate>,

    /// Only consider items created on or before this date
    pub end_date: Option<NaiveDate>,

    /// Index and download videos as well as photos
    pub include_video: bool,

    /// Ignore the stored watermark and rescan the whole library
    pub rescan: bool,

    /// Also consider records already marked as downloaded
    pub retry_download: bool,

    /// Transfer timeout for photos
    pub photo_timeout: Duration,

    /// Transfer timeout for videos
    pub video_timeout: Duration,

    /// Size of the download worker pool
    pub max_concurrent_downloads: usize,

    /// Number of items resolved per batch lookup
    pub batch_size: usize,

    /// Number of items requested per catalog page
    pub page_size: u32,

    /// Inserted records between index checkpoints
    pub index_checkpoint_interval: u64,

    /// Phases run by a full sync
    pub phases: SyncPhases,
}

impl MirrorConfig {
    /// Creates a new builder for constructing a `MirrorConfig`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::MirrorConfig;
    ///
    /// let config = MirrorConfig::builder()
    ///     .root_folder("/tmp/mirror")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.batch_size, 40);
    /// ```
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Directory holding media files, i.e. `<root>/<media_folder>`
    pub fn media_root(&self) -> PathBuf {
        self.root_folder.join(&self.media_folder)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Root folder and database path are not empty
    /// - The date range is not inverted
    /// - Worker pool, batch and page sizes are within the remote limits
    /// - Timeouts are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.root_folder.as_os_str().is_empty() {
            return Err(Error::Config("Root folder cannot be empty".to_string()));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.media_folder.is_empty() || self.media_folder.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "Media folder must be a single path component, got '{}'",
                self.media_folder
            )));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(Error::Config(format!(
                    "Start date {} is after end date {}",
                    start, end
                )));
            }
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "Worker pool size must be at least 1".to_string(),
            ));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "Batch size must be between 1 and {}, got {}. \
                 Larger batches are truncated by the remote service.",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.photo_timeout.is_zero() || self.video_timeout.is_zero() {
            return Err(Error::Config(
                "Download timeouts must be greater than zero".to_string(),
            ));
        }

        if self.index_checkpoint_interval == 0 {
            return Err(Error::Config(
                "Index checkpoint interval must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` date as accepted by the date bounds.
///
/// # Examples
///
/// ```
/// use core_runtime::config::parse_date;
///
/// let date = parse_date("2023-01-03").unwrap();
/// assert_eq!(date.to_string(), "2023-01-03");
/// assert!(parse_date("03/01/2023").is_err());
/// ```
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Config(format!("Invalid date '{}': {} (expected YYYY-MM-DD)", value, e)))
}

/// Builder for constructing [`MirrorConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](MirrorConfigBuilder::build) to create the final config.
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    root_folder: Option<PathBuf>,
    database_path: Option<PathBuf>,
    media_folder: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    include_video: Option<bool>,
    rescan: bool,
    retry_download: bool,
    photo_timeout: Option<Duration>,
    video_timeout: Option<Duration>,
    max_concurrent_downloads: Option<usize>,
    batch_size: Option<usize>,
    page_size: Option<u32>,
    index_checkpoint_interval: Option<u64>,
    phases: Option<SyncPhases>,
}

impl MirrorConfigBuilder {
    /// Sets the mirror root.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::MirrorConfig;
    ///
    /// let builder = MirrorConfig::builder()
    ///     .root_folder("/srv/photos");
    /// ```
    pub fn root_folder<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_folder = Some(path.into());
        self
    }

    /// Sets the SQLite index path.
    ///
    /// Default: `<root>/gphotos.sqlite`
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the media subfolder name.
    ///
    /// Default: `photos`
    pub fn media_folder(mut self, folder: impl Into<String>) -> Self {
        self.media_folder = Some(folder.into());
        self
    }

    /// Restricts indexing and downloading to items created on or after `date`.
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Restricts indexing and downloading to items created on or before `date`.
    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Includes or excludes videos.
    ///
    /// Default: `true`
    pub fn include_video(mut self, include: bool) -> Self {
        self.include_video = Some(include);
        self
    }

    /// Forces a full rescan that ignores the stored watermark.
    pub fn rescan(mut self, rescan: bool) -> Self {
        self.rescan = rescan;
        self
    }

    /// Also reconsiders records already marked as downloaded.
    pub fn retry_download(mut self, retry: bool) -> Self {
        self.retry_download = retry;
        self
    }

    /// Sets the transfer timeout for photos.
    ///
    /// Default: 60 seconds
    pub fn photo_timeout(mut self, timeout: Duration) -> Self {
        self.photo_timeout = Some(timeout);
        self
    }

    /// Sets the transfer timeout for videos.
    ///
    /// Default: 2000 seconds
    pub fn video_timeout(mut self, timeout: Duration) -> Self {
        self.video_timeout = Some(timeout);
        self
    }

    /// Sets the size of the download worker pool.
    ///
    /// Default: 20
    pub fn max_concurrent_downloads(mut self, workers: usize) -> Self {
        self.max_concurrent_downloads = Some(workers);
        self
    }

    /// Sets the number of items resolved per batch lookup.
    ///
    /// Default: 40
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the number of items requested per catalog page.
    ///
    /// Default: 100
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets how many inserted records pass between index checkpoints.
    ///
    /// Default: 2000
    pub fn index_checkpoint_interval(mut self, interval: u64) -> Self {
        self.index_checkpoint_interval = Some(interval);
        self
    }

    /// Selects the phases run by a full sync.
    pub fn phases(mut self, phases: SyncPhases) -> Self {
        self.phases = Some(phases);
        self
    }

    /// Builds the final `MirrorConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(MirrorConfig)` on success, or an error if:
    /// - The root folder is missing
    /// - Configuration values are invalid
    pub fn build(self) -> Result<MirrorConfig> {
        let root_folder = self.root_folder.ok_or_else(|| {
            Error::Config("Root folder is required. Use .root_folder() to set it.".to_string())
        })?;

        let database_path = self
            .database_path
            .unwrap_or_else(|| root_folder.join(DEFAULT_DATABASE_NAME));

        let config = MirrorConfig {
            root_folder,
            database_path,
            media_folder: self
                .media_folder
                .unwrap_or_else(|| DEFAULT_MEDIA_FOLDER.to_string()),
            start_date: self.start_date,
            end_date: self.end_date,
            include_video: self.include_video.unwrap_or(true),
            rescan: self.rescan,
            retry_download: self.retry_download,
            photo_timeout: self.photo_timeout.unwrap_or(Duration::from_secs(60)),
            video_timeout: self.video_timeout.unwrap_or(Duration::from_secs(2000)),
            max_concurrent_downloads: self.max_concurrent_downloads.unwrap_or(20),
            batch_size: self.batch_size.unwrap_or(40),
            page_size: self.page_size.unwrap_or(MAX_PAGE_SIZE),
            index_checkpoint_interval: self.index_checkpoint_interval.unwrap_or(2000),
            phases: self.phases.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_with_defaults() {
        let config = MirrorConfig::builder()
            .root_folder("/tmp/mirror")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/mirror/gphotos.sqlite"));
        assert_eq!(config.media_root(), PathBuf::from("/tmp/mirror/photos"));
        assert_eq!(config.max_concurrent_downloads, 20);
        assert_eq!(config.batch_size, 40);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.photo_timeout, Duration::from_secs(60));
        assert_eq!(config.video_timeout, Duration::from_secs(2000));
        assert!(config.include_video);
        assert!(!config.rescan);
        assert!(!config.retry_download);
        assert_eq!(config.phases, SyncPhases::default());
    }

    #[test]
    fn test_missing_root_folder() {
        let err = MirrorConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("Root folder is required"));
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let result = MirrorConfig::builder()
            .root_folder("/tmp/mirror")
            .start_date(parse_date("2023-02-01").unwrap())
            .end_date(parse_date("2023-01-01").unwrap())
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_size_limits() {
        let zero_workers = MirrorConfig::builder()
            .root_folder("/tmp/mirror")
            .max_concurrent_downloads(0)
            .build();
        assert!(zero_workers.is_err());

        let oversized_batch = MirrorConfig::builder()
            .root_folder("/tmp/mirror")
            .batch_size(MAX_BATCH_SIZE + 1)
            .build();
        assert!(oversized_batch.is_err());

        let oversized_page = MirrorConfig::builder()
            .root_folder("/tmp/mirror")
            .page_size(MAX_PAGE_SIZE + 1)
            .build();
        assert!(oversized_page.is_err());
    }

    #[test]
    fn test_media_folder_must_be_single_component() {
        let result = MirrorConfig::builder()
            .root_folder("/tmp/mirror")
            .media_folder("photos/nested")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(" 2023-01-03 ").unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 3).unwrap()
        );
        assert!(parse_date("2023-13-01").is_err());
    }
}
