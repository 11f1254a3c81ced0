//! Google Photos Library API request and response types
//!
//! Data structures for the `mediaItems` endpoints of the Library API v1.

use serde::{Deserialize, Serialize};

/// Google Photos media item resource
///
/// See: https://developers.google.com/photos/library/reference/rest/v1/mediaItems#MediaItem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    /// Media item ID
    pub id: String,

    /// Description shown in the item's info panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Link to the item in the Google Photos web UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,

    /// Time-limited base URL for the item's bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Filename shown to the user
    #[serde(default)]
    pub filename: String,

    /// Creation time, dimensions and kind-specific metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_metadata: Option<MediaMetadata>,
}

/// Metadata common to photos and videos
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    /// Creation time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,

    /// Width in pixels (decimal string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,

    /// Height in pixels (decimal string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,

    /// Present when the item is a photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<PhotoMetadata>,

    /// Present when the item is a video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    /// Processing status, `READY` once the video can be downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Response of `mediaItems.list` and `mediaItems.search`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsResponse {
    /// Items on this page; omitted entirely for an empty page
    #[serde(default)]
    pub media_items: Vec<MediaItem>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of `mediaItems.search`
///
/// See: https://developers.google.com/photos/library/reference/rest/v1/mediaItems/search
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub page_size: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,

    pub filters: Filters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filters {
    pub date_filter: DateFilter,
    pub media_type_filter: MediaTypeFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct DateFilter {
    pub ranges: Vec<ApiDateRange>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDateRange {
    pub start_date: ApiDate,
    pub end_date: ApiDate,
}

/// Calendar date as the Library API encodes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTypeFilter {
    pub media_types: Vec<String>,
}

/// Response of `mediaItems.batchGet`
///
/// See: https://developers.google.com/photos/library/reference/rest/v1/mediaItems/batchGet
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetResponse {
    /// One entry per requested id, in request order
    #[serde(default)]
    pub media_item_results: Vec<MediaItemResult>,

    /// Present when the service dropped results
    #[serde(default, alias = "pageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemResult {
    #[serde(default)]
    pub status: Option<Status>,

    #[serde(default)]
    pub media_item: Option<MediaItem>,
}

/// `google.rpc.Status` attached to a failed batch entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,

    #[serde(default)]
    pub message: String,
}
