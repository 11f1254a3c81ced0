//! In-memory collaborators shared by the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    catalog::{
        BatchGetResult, BatchItemResult, CatalogPage, ItemStatus, KindFilter, MediaCatalog,
        MediaKind, RemoteMediaItem, SearchQuery,
    },
    error::{BridgeError, Result},
    http::{ByteStream, HttpClient, HttpRequest, HttpResponse},
};
use chrono::{DateTime, NaiveDate, Utc};
use core_library::{
    create_test_pool, CandidateCursor, CandidateFilter, MediaRecord, MediaRepository,
    SqliteMediaRepository,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};

pub const BASE_URL: &str = "https://media.test";

pub fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().unwrap()
}

pub fn photo(id: &str, filename: &str, created: &str) -> RemoteMediaItem {
    RemoteMediaItem {
        id: id.to_string(),
        filename: filename.to_string(),
        description: None,
        mime_type: Some("image/jpeg".to_string()),
        base_url: Some(format!("{}/{}", BASE_URL, id)),
        kind: MediaKind::Photo,
        created_at: Some(at(created)),
        modified_at: Some(at(created)),
        size: None,
        checksum: None,
    }
}

pub fn video(id: &str, filename: &str, created: &str) -> RemoteMediaItem {
    RemoteMediaItem {
        mime_type: Some("video/mp4".to_string()),
        kind: MediaKind::Video,
        ..photo(id, filename, created)
    }
}

/// Download URL the engine requests for a photo fixture
pub fn photo_url(id: &str) -> String {
    format!("{}/{}=d", BASE_URL, id)
}

pub async fn test_store() -> Arc<SqliteMediaRepository> {
    let pool = create_test_pool().await.unwrap();
    Arc::new(SqliteMediaRepository::new(pool))
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Default)]
struct CatalogState {
    items: Vec<RemoteMediaItem>,
    fail_batches: bool,
    truncate_batches: bool,
    missing: HashSet<String>,
    fail_pages_from: Option<usize>,
    batch_calls: Vec<Vec<String>>,
    get_calls: Vec<String>,
    list_calls: usize,
    search_calls: Vec<SearchQuery>,
}

/// Remote library held in memory
#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    pub fn new(items: Vec<RemoteMediaItem>) -> Arc<Self> {
        let catalog = Self::default();
        catalog.state.lock().unwrap().items = items;
        Arc::new(catalog)
    }

    pub fn add(&self, item: RemoteMediaItem) {
        self.state.lock().unwrap().items.push(item);
    }

    /// Every `batch_get` answers 503
    pub fn fail_batches(&self) {
        self.state.lock().unwrap().fail_batches = true;
    }

    /// `batch_get` reports more results than it returned
    pub fn truncate_batches(&self) {
        self.state.lock().unwrap().truncate_batches = true;
    }

    /// The item is gone remotely: batch entries carry a status, `get` answers 404
    pub fn remove_remotely(&self, id: &str) {
        self.state.lock().unwrap().missing.insert(id.to_string());
    }

    /// `list` and `search` answer 503 for pages starting at or after `offset`;
    /// `None` restores normal paging
    pub fn fail_pages_from(&self, offset: Option<usize>) {
        self.state.lock().unwrap().fail_pages_from = offset;
    }

    pub fn batch_calls(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().batch_calls.clone()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().get_calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn search_calls(&self) -> Vec<SearchQuery> {
        self.state.lock().unwrap().search_calls.clone()
    }

    fn page(items: Vec<RemoteMediaItem>, token: Option<String>, page_size: u32) -> CatalogPage {
        let offset: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let page_size = page_size.max(1) as usize;
        let end = (offset + page_size).min(items.len());
        let slice = items.get(offset..end).unwrap_or_default().to_vec();

        CatalogPage {
            items: slice,
            next_page_token: (end < items.len()).then(|| end.to_string()),
        }
    }

    fn check_page(state: &CatalogState, token: Option<&String>) -> Result<()> {
        let offset: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
        match state.fail_pages_from {
            Some(from) if offset >= from => Err(BridgeError::HttpStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn lookup(state: &CatalogState, id: &str) -> Option<RemoteMediaItem> {
        if state.missing.contains(id) {
            return None;
        }
        state.items.iter().find(|item| item.id == id).cloned()
    }
}

fn in_range(item: &RemoteMediaItem, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    let Some(date) = item.created_at.map(|c| c.date_naive()) else {
        return true;
    };
    start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
}

#[async_trait]
impl MediaCatalog for FakeCatalog {
    async fn search(&self, page_token: Option<String>, query: &SearchQuery) -> Result<CatalogPage> {
        let mut state = self.state.lock().unwrap();
        state.search_calls.push(*query);
        Self::check_page(&state, page_token.as_ref())?;
        let matching = state
            .items
            .iter()
            .filter(|item| in_range(item, query.date_range.start, query.date_range.end))
            .filter(|item| query.kinds == KindFilter::All || item.kind == MediaKind::Photo)
            .cloned()
            .collect();
        Ok(Self::page(matching, page_token, query.page_size))
    }

    async fn list(&self, page_token: Option<String>, page_size: u32) -> Result<CatalogPage> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Self::check_page(&state, page_token.as_ref())?;
        Ok(Self::page(state.items.clone(), page_token, page_size))
    }

    async fn batch_get(&self, ids: &[String]) -> Result<BatchGetResult> {
        let mut state = self.state.lock().unwrap();
        state.batch_calls.push(ids.to_vec());

        if state.fail_batches {
            return Err(BridgeError::HttpStatus {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }

        let mut results: Vec<BatchItemResult> = ids
            .iter()
            .map(|id| match Self::lookup(&state, id) {
                Some(item) => BatchItemResult {
                    id: id.clone(),
                    item: Some(item),
                    status: None,
                },
                None => BatchItemResult {
                    id: id.clone(),
                    item: None,
                    status: Some(ItemStatus {
                        code: 5,
                        message: "Requested entity was not found.".to_string(),
                    }),
                },
            })
            .collect();

        let truncated = state.truncate_batches && results.len() > 1;
        if truncated {
            results.pop();
        }

        Ok(BatchGetResult { results, truncated })
    }

    async fn get(&self, id: &str) -> Result<RemoteMediaItem> {
        let mut state = self.state.lock().unwrap();
        state.get_calls.push(id.to_string());
        Self::lookup(&state, id).ok_or_else(|| BridgeError::HttpStatus {
            status: 404,
            message: "Not Found".to_string(),
        })
    }
}

// ============================================================================
// Store
// ============================================================================

/// SQLite store that records the record count at every checkpoint
pub struct CheckpointingStore {
    inner: SqliteMediaRepository,
    checkpoints: Mutex<Vec<i64>>,
}

impl CheckpointingStore {
    pub async fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteMediaRepository::new(create_test_pool().await.unwrap()),
            checkpoints: Mutex::new(Vec::new()),
        })
    }

    /// Records present in the store at each checkpoint, in order
    pub fn checkpoints(&self) -> Vec<i64> {
        self.checkpoints.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaRepository for CheckpointingStore {
    async fn get_by_path(
        &self,
        relative_folder: &str,
        filename: &str,
    ) -> core_library::Result<Option<MediaRecord>> {
        self.inner.get_by_path(relative_folder, filename).await
    }

    async fn find_by_id(&self, id: &str) -> core_library::Result<Option<MediaRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn upsert(&self, record: &MediaRecord) -> core_library::Result<()> {
        self.inner.upsert(record).await
    }

    async fn mark_downloaded(&self, id: &str) -> core_library::Result<()> {
        self.inner.mark_downloaded(id).await
    }

    async fn reset_download(&self, id: &str) -> core_library::Result<()> {
        self.inner.reset_download(id).await
    }

    async fn get_watermark(&self) -> core_library::Result<Option<DateTime<Utc>>> {
        self.inner.get_watermark().await
    }

    async fn set_watermark(&self, watermark: DateTime<Utc>) -> core_library::Result<()> {
        self.inner.set_watermark(watermark).await
    }

    async fn duplicate_number(
        &self,
        relative_folder: &str,
        orig_name: &str,
        id: &str,
    ) -> core_library::Result<i64> {
        self.inner.duplicate_number(relative_folder, orig_name, id).await
    }

    async fn find_candidates(
        &self,
        filter: &CandidateFilter,
        after: Option<&CandidateCursor>,
        limit: u32,
    ) -> core_library::Result<Vec<MediaRecord>> {
        self.inner.find_candidates(filter, after, limit).await
    }

    async fn checkpoint(&self) -> core_library::Result<()> {
        self.inner.checkpoint().await?;
        let count = self.inner.count().await?;
        self.checkpoints.lock().unwrap().push(count);
        Ok(())
    }

    async fn count(&self) -> core_library::Result<i64> {
        self.inner.count().await
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[derive(Clone)]
enum Response {
    Body(Vec<u8>),
    Status(u16),
    /// Sends a few bytes, then the connection drops
    Broken,
    /// Never sends anything
    Stalled,
}

/// Content server with concurrency tracking
#[derive(Default)]
pub struct FakeHttp {
    responses: Mutex<HashMap<String, Response>>,
    requests: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl FakeHttp {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each request holds its slot for `latency` before answering
    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    pub fn serve(&self, url: impl Into<String>, body: &[u8]) {
        self.respond(url, Response::Body(body.to_vec()));
    }

    pub fn fail(&self, url: impl Into<String>, status: u16) {
        self.respond(url, Response::Status(status));
    }

    pub fn break_transfer(&self, url: impl Into<String>) {
        self.respond(url, Response::Broken);
    }

    pub fn stall(&self, url: impl Into<String>) {
        self.respond(url, Response::Stalled);
    }

    fn respond(&self, url: impl Into<String>, response: Response) {
        self.responses.lock().unwrap().insert(url.into(), response);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// `start:<url>` / `end:<url>` in the order they happened
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        Err(BridgeError::NotAvailable(format!(
            "unexpected request to {}",
            request.url
        )))
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<ByteStream> {
        let url = request.url;
        self.requests.lock().unwrap().push(url.clone());
        self.events.lock().unwrap().push(format!("start:{}", url));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(format!("end:{}", url));

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or(Response::Status(404));

        match response {
            Response::Body(bytes) => Ok(Box::new(io::Cursor::new(bytes))),
            Response::Status(status) => Err(BridgeError::HttpStatus {
                status,
                message: format!("status {}", status),
            }),
            Response::Broken => Ok(Box::new(BrokenBody { sent: false })),
            Response::Stalled => Ok(Box::new(StalledBody)),
        }
    }
}

struct BrokenBody {
    sent: bool,
}

impl AsyncRead for BrokenBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.sent {
            Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        } else {
            self.sent = true;
            buf.put_slice(b"partial body");
            Poll::Ready(Ok(()))
        }
    }
}

struct StalledBody;

impl AsyncRead for StalledBody {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

/// Names of every entry in `dir`, sorted
pub fn list_dir(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
