//! # Indexer
//!
//! Pages through the remote catalog and records every item in the index.
//!
//! ## Workflow
//!
//! 1. Pick the start boundary: the explicit start date, else the stored
//!    watermark (unless a rescan is forced), else the whole library
//! 2. Use `list` for an unfiltered scan and `search` otherwise
//! 3. Place each item in its year/month folder, disambiguate its filename and
//!    insert, refresh or skip it
//! 4. Checkpoint the store every `checkpoint_interval` inserts
//! 5. After an unbounded scan, advance the watermark to the newest creation
//!    time seen
//!
//! A catalog failure aborts the run; everything inserted before the last
//! checkpoint is kept and the next run resumes from the watermark.

use bridge_traits::catalog::{DateRange, KindFilter, MediaCatalog, RemoteMediaItem, SearchQuery};
use chrono::{DateTime, NaiveDate, Utc};
use core_library::{MediaRecord, MediaRepository};
use core_runtime::config::{MirrorConfig, DEFAULT_MEDIA_FOLDER};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};

/// Parameters of one indexing run
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Explicit start date; overrides the watermark and keeps it unchanged
    pub start_date: Option<NaiveDate>,
    /// Explicit end date; keeps the watermark unchanged
    pub end_date: Option<NaiveDate>,
    pub include_video: bool,
    /// Ignore the watermark
    pub rescan: bool,
    pub page_size: u32,
    /// Inserted records between store checkpoints
    pub checkpoint_interval: u64,
    /// Media subfolder the year/month folders are placed under
    pub media_folder: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            include_video: true,
            rescan: false,
            page_size: 100,
            checkpoint_interval: 2000,
            media_folder: DEFAULT_MEDIA_FOLDER.to_string(),
        }
    }
}

impl From<&MirrorConfig> for IndexOptions {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            start_date: config.start_date,
            end_date: config.end_date,
            include_video: config.include_video,
            rescan: config.rescan,
            page_size: config.page_size,
            checkpoint_interval: config.index_checkpoint_interval,
            media_folder: config.media_folder.clone(),
        }
    }
}

impl IndexOptions {
    /// A scan limited by the caller never moves the watermark
    pub fn is_bounded(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }
}

/// Counters for one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub pages: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Items already indexed and current
    pub unchanged: u64,
    /// Descriptors rejected as malformed
    pub malformed: u64,
    /// Newest creation time seen during the run
    pub newest_created: Option<DateTime<Utc>>,
    /// Watermark after the run
    pub watermark: Option<DateTime<Utc>>,
}

/// Catalog-to-index scanner
pub struct Indexer {
    catalog: Arc<dyn MediaCatalog>,
    store: Arc<dyn MediaRepository>,
    options: IndexOptions,
    cancellation: CancellationToken,
}

impl Indexer {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        store: Arc<dyn MediaRepository>,
        options: IndexOptions,
    ) -> Self {
        Self {
            catalog,
            store,
            options,
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop between pages once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Run one scan
    ///
    /// # Errors
    ///
    /// - [`SyncError::Catalog`] when a page cannot be fetched
    /// - [`SyncError::Store`] when the index cannot be read or written
    /// - [`SyncError::Cancelled`] when the token fires between pages
    #[instrument(skip(self), fields(
        start = ?self.options.start_date,
        end = ?self.options.end_date,
        rescan = self.options.rescan
    ))]
    pub async fn run(&self) -> Result<IndexStats> {
        let previous_watermark = self.store.get_watermark().await?;

        let start = match self.options.start_date {
            Some(date) => Some(date),
            None if !self.options.rescan => previous_watermark.map(|w| w.date_naive()),
            None => None,
        };
        let query = SearchQuery {
            date_range: DateRange::new(start, self.options.end_date),
            kinds: KindFilter::from_include_video(self.options.include_video),
            page_size: self.options.page_size,
        };
        let whole_library = query.date_range.is_unbounded() && self.options.include_video;

        info!(
            start = ?start,
            end = ?self.options.end_date,
            include_video = self.options.include_video,
            "Indexing remote library"
        );

        let mut stats = IndexStats {
            watermark: previous_watermark,
            ..Default::default()
        };
        let mut since_checkpoint = 0u64;
        let mut page_token: Option<String> = None;

        loop {
            if self.cancellation.is_cancelled() {
                self.store.checkpoint().await?;
                return Err(SyncError::Cancelled);
            }

            let page = if whole_library {
                self.catalog.list(page_token.take(), query.page_size).await
            } else {
                self.catalog.search(page_token.take(), &query).await
            }
            .map_err(SyncError::from_catalog)?;

            stats.pages += 1;
            debug!(page = stats.pages, items = page.items.len(), "Fetched catalog page");

            if page.items.is_empty() {
                break;
            }

            for item in page.items {
                if self.index_item(item, &mut stats).await? {
                    since_checkpoint += 1;
                    if since_checkpoint >= self.options.checkpoint_interval {
                        self.store.checkpoint().await?;
                        since_checkpoint = 0;
                        info!(inserted = stats.inserted, "Index checkpoint");
                    }
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if !self.options.is_bounded() {
            if let Some(newest) = stats.newest_created {
                let watermark = previous_watermark.map_or(newest, |prev| prev.max(newest));
                if Some(watermark) != previous_watermark {
                    self.store.set_watermark(watermark).await?;
                }
                stats.watermark = Some(watermark);
            }
        }

        self.store.checkpoint().await?;

        info!(
            inserted = stats.inserted,
            updated = stats.updated,
            unchanged = stats.unchanged,
            malformed = stats.malformed,
            "Indexing complete"
        );

        Ok(stats)
    }

    /// Returns `true` when a new record was inserted
    async fn index_item(&self, item: RemoteMediaItem, stats: &mut IndexStats) -> Result<bool> {
        let record = match MediaRecord::from_remote(&item, &self.options.media_folder) {
            Ok(record) => record,
            Err(e) => {
                warn!(id = %item.id, error = %e, "Skipping malformed media item");
                stats.malformed += 1;
                return Ok(false);
            }
        };

        stats.newest_created = stats
            .newest_created
            .max(Some(record.created_at));

        let duplicate_number = self
            .store
            .duplicate_number(&record.relative_folder, &record.orig_name, &record.id)
            .await?;
        let record = record.with_duplicate_number(duplicate_number);

        match self
            .store
            .get_by_path(&record.relative_folder, &record.filename)
            .await?
        {
            None => {
                self.store.upsert(&record).await?;
                stats.inserted += 1;
                debug!(id = %record.id, path = %record.relative_path().display(), "Indexed new item");
                Ok(true)
            }
            Some(existing) if existing.modified_at < record.modified_at => {
                self.store.upsert(&record).await?;
                stats.updated += 1;
                debug!(id = %record.id, "Refreshed modified item");
                Ok(false)
            }
            Some(_) => {
                stats.unchanged += 1;
                Ok(false)
            }
        }
    }
}
