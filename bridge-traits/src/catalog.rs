//! Remote Media Catalog Abstraction
//!
//! Contract for the remote photo library the mirror is built from. Providers
//! translate their wire formats into [`RemoteMediaItem`] descriptors; the sync
//! engine never sees provider-specific JSON.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Kind of a media item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    /// Suffix appended to a resolved base URL to fetch the original bytes
    pub fn download_suffix(&self) -> &'static str {
        match self {
            MediaKind::Photo => "=d",
            MediaKind::Video => "=dv",
        }
    }

    /// Guess the kind from a MIME type, defaulting to photo
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Photo
        }
    }
}

impl FromStr for MediaKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "photo" => Ok(MediaKind::Photo),
            "video" => Ok(MediaKind::Video),
            _ => Err(BridgeError::OperationFailed(format!(
                "Unknown media kind: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw item descriptor returned by a catalog
///
/// Fields are optional where the remote API may omit them; the indexer treats
/// a descriptor without a creation time as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMediaItem {
    pub id: String,
    pub filename: String,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    /// Time-limited base URL for content download
    pub base_url: Option<String>,
    pub kind: MediaKind,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub checksum: Option<String>,
}

impl RemoteMediaItem {
    /// URL to fetch the item's original bytes, if a base URL was resolved
    pub fn download_url(&self) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}{}", base, self.kind.download_suffix()))
    }
}

/// Inclusive date bounds for a search; `None` leaves that end open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Which media kinds a search should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    All,
    PhotosOnly,
}

impl KindFilter {
    pub fn from_include_video(include_video: bool) -> Self {
        if include_video {
            KindFilter::All
        } else {
            KindFilter::PhotosOnly
        }
    }
}

/// Search parameters that stay constant across the pages of one scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchQuery {
    pub date_range: DateRange,
    pub kinds: KindFilter,
    pub page_size: u32,
}

/// One page of catalog results
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<RemoteMediaItem>,
    pub next_page_token: Option<String>,
}

/// Per-item status attached to a batch result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    pub code: i32,
    pub message: String,
}

/// Result for one requested identifier in a batch lookup
#[derive(Debug, Clone)]
pub struct BatchItemResult {
    /// Identifier that was requested
    pub id: String,
    /// Resolved item, absent when the remote returned nothing usable
    pub item: Option<RemoteMediaItem>,
    /// Non-success status reported for this item, if any
    pub status: Option<ItemStatus>,
}

/// Response of a batch lookup
#[derive(Debug, Clone, Default)]
pub struct BatchGetResult {
    pub results: Vec<BatchItemResult>,
    /// The remote had more results than it returned
    pub truncated: bool,
}

/// Remote media catalog trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{MediaCatalog, SearchQuery};
///
/// async fn first_page(catalog: &dyn MediaCatalog, query: &SearchQuery) -> Result<usize> {
///     let page = catalog.search(None, query).await?;
///     Ok(page.items.len())
/// }
/// ```
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Search the library with date and kind filters
    async fn search(&self, page_token: Option<String>, query: &SearchQuery) -> Result<CatalogPage>;

    /// List the whole library without filters
    async fn list(&self, page_token: Option<String>, page_size: u32) -> Result<CatalogPage>;

    /// Resolve several items in one call
    async fn batch_get(&self, ids: &[String]) -> Result<BatchGetResult>;

    /// Resolve a single item
    async fn get(&self, id: &str) -> Result<RemoteMediaItem>;
}
