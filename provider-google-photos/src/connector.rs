//! Google Photos Library API connector implementation
//!
//! Implements the `MediaCatalog` trait for the Library API v1.

use async_trait::async_trait;
use bridge_traits::catalog::{
    BatchGetResult, BatchItemResult, CatalogPage, DateRange, ItemStatus, KindFilter,
    MediaCatalog, MediaKind, RemoteMediaItem, SearchQuery,
};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GooglePhotosError;
use crate::types::{
    ApiDate, ApiDateRange, BatchGetResponse, DateFilter, Filters, MediaItem, MediaItemsResponse,
    MediaTypeFilter, SearchRequest,
};

/// Google Photos Library API base URL
pub const PHOTOS_API_BASE: &str = "https://photoslibrary.googleapis.com/v1";

/// Maximum results per page (Library API limit)
const MAX_PAGE_SIZE: u32 = 100;

/// Timeout for metadata calls; content transfers use their own per-kind timeout
const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Photos Library API connector
///
/// # Features
///
/// - `mediaItems.list` for the whole library
/// - `mediaItems.search` with a date range and media type filter
/// - `mediaItems.batchGet` and `mediaItems.get` to refresh base URLs
///
/// Transport-level retry is left to the [`HttpClient`]; a response that is
/// still unsuccessful is reported as [`BridgeError::HttpStatus`](bridge_traits::BridgeError::HttpStatus).
///
/// # Example
///
/// ```ignore
/// use provider_google_photos::GooglePhotosConnector;
/// use bridge_traits::catalog::MediaCatalog;
///
/// let connector = GooglePhotosConnector::new(http_client, access_token);
/// let page = connector.list(None, 100).await?;
/// ```
pub struct GooglePhotosConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 access token with `photoslibrary.readonly` scope
    access_token: String,

    /// API root, overridable for tests
    api_base: String,
}

impl GooglePhotosConnector {
    /// Create a new Google Photos connector
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: String) -> Self {
        Self {
            http_client,
            access_token,
            api_base: PHOTOS_API_BASE.to_string(),
        }
    }

    /// Point the connector at a different API root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Parse RFC 3339 timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn api_date(date: NaiveDate) -> ApiDate {
        ApiDate {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Build the `mediaItems.search` body; open ends span the whole library
    fn search_request(page_token: Option<String>, query: &SearchQuery) -> SearchRequest {
        let DateRange { start, end } = query.date_range;
        let start = start.map(Self::api_date).unwrap_or(ApiDate {
            year: 1900,
            month: 1,
            day: 1,
        });
        let end = end.map(Self::api_date).unwrap_or(ApiDate {
            year: 3000,
            month: 1,
            day: 1,
        });

        let media_types = match query.kinds {
            KindFilter::All => vec!["ALL_MEDIA".to_string()],
            KindFilter::PhotosOnly => vec!["PHOTO".to_string()],
        };

        SearchRequest {
            page_size: query.page_size.clamp(1, MAX_PAGE_SIZE),
            page_token,
            filters: Filters {
                date_filter: DateFilter {
                    ranges: vec![ApiDateRange {
                        start_date: start,
                        end_date: end,
                    }],
                },
                media_type_filter: MediaTypeFilter { media_types },
            },
        }
    }

    /// Convert MediaItem to RemoteMediaItem
    fn convert_item(item: MediaItem) -> RemoteMediaItem {
        let metadata = item.media_metadata.unwrap_or_default();

        let kind = if metadata.video.is_some() {
            MediaKind::Video
        } else if metadata.photo.is_some() {
            MediaKind::Photo
        } else {
            item.mime_type
                .as_deref()
                .map(MediaKind::from_mime_type)
                .unwrap_or(MediaKind::Photo)
        };

        RemoteMediaItem {
            id: item.id,
            filename: item.filename,
            description: item.description.filter(|d| !d.is_empty()),
            mime_type: item.mime_type,
            base_url: item.base_url,
            kind,
            created_at: metadata
                .creation_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            // The Library API does not expose modification time, size or checksum
            modified_at: None,
            size: None,
            checksum: None,
        }
    }

    fn request(&self, request: HttpRequest) -> HttpRequest {
        request
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT)
    }

    /// Execute an API call and reject non-success statuses
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(self.request(request)).await?;

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            Ok(response)
        } else {
            warn!(status = response.status, "API request failed");
            Err(GooglePhotosError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            }
            .into())
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse {}: {}", what, e)).into()
        })
    }

    fn into_page(response: MediaItemsResponse) -> CatalogPage {
        CatalogPage {
            items: response
                .media_items
                .into_iter()
                .map(Self::convert_item)
                .collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl MediaCatalog for GooglePhotosConnector {
    #[instrument(skip(self, page_token))]
    async fn search(&self, page_token: Option<String>, query: &SearchQuery) -> Result<CatalogPage> {
        let body = Self::search_request(page_token, query);
        let request =
            HttpRequest::post(format!("{}/mediaItems:search", self.api_base)).json(&body)?;

        let response = self.send(request).await?;
        let page = Self::into_page(Self::parse(&response, "search response")?);

        info!(items = page.items.len(), "Searched media items");
        Ok(page)
    }

    #[instrument(skip(self, page_token))]
    async fn list(&self, page_token: Option<String>, page_size: u32) -> Result<CatalogPage> {
        let mut url = format!(
            "{}/mediaItems?pageSize={}",
            self.api_base,
            page_size.clamp(1, MAX_PAGE_SIZE)
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let response = self.send(HttpRequest::get(url)).await?;
        let page = Self::into_page(Self::parse(&response, "list response")?);

        info!(items = page.items.len(), "Listed media items");
        Ok(page)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn batch_get(&self, ids: &[String]) -> Result<BatchGetResult> {
        if ids.is_empty() {
            return Ok(BatchGetResult::default());
        }

        let query = ids
            .iter()
            .map(|id| format!("mediaItemIds={}", urlencoding::encode(id)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}/mediaItems:batchGet?{}", self.api_base, query);

        let response = self.send(HttpRequest::get(url)).await?;
        let batch: BatchGetResponse = Self::parse(&response, "batchGet response")?;

        let truncated = batch
            .next_page_token
            .as_deref()
            .is_some_and(|t| !t.is_empty());

        // Results come back in request order; failed entries carry no item id
        let results = batch
            .media_item_results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| {
                let id = result
                    .media_item
                    .as_ref()
                    .map(|item| item.id.clone())
                    .or_else(|| ids.get(index).cloned())?;

                Some(BatchItemResult {
                    id,
                    item: result.media_item.map(Self::convert_item),
                    status: result
                        .status
                        .filter(|status| status.code != 0)
                        .map(|status| ItemStatus {
                            code: status.code,
                            message: status.message,
                        }),
                })
            })
            .collect();

        Ok(BatchGetResult { results, truncated })
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<RemoteMediaItem> {
        if id.is_empty() {
            return Err(GooglePhotosError::InvalidRequest("empty media item id".to_string()).into());
        }

        let url = format!("{}/mediaItems/{}", self.api_base, urlencoding::encode(id));
        let response = self.send(HttpRequest::get(url)).await?;
        let item: MediaItem = Self::parse(&response, "media item")?;

        Ok(Self::convert_item(item))
    }
}
