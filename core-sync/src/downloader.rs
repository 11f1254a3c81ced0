//! # Download Orchestrator
//!
//! Fetches the bytes of every indexed item that is not yet on disk.
//!
//! ## Workflow
//!
//! 1. Stream candidate records from the store in batches of `batch_size`
//! 2. Skip records whose file already exists (marking them downloaded) and
//!    records held in the quarantine ledger
//! 3. Resolve download URLs for the rest with one `batch_get`, falling back to
//!    one `get` per item when the batch call fails
//! 4. Hand each resolved item to a bounded pool of download workers
//! 5. Drain the pool, then persist the quarantine ledger and log a summary
//!
//! ## Concurrency
//!
//! Workers only stream bytes into their own temporary file. The coordinator
//! owns the pool, the in-flight task map, the ledger and every store write, so
//! the store never sees concurrent writers. When the pool is full the
//! coordinator waits for one worker to finish before submitting the next.
//!
//! ## Failure handling
//!
//! | Failure | Counted | Quarantined |
//! |---------|---------|-------------|
//! | HTTP status from the download | yes | yes |
//! | Transport error or timeout | yes | no |
//! | Local I/O error | yes | no |
//! | `get` failure after a batch fallback | yes | yes |
//! | Cancellation | no | no |

use bridge_traits::catalog::{BatchItemResult, MediaCatalog, MediaKind};
use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use chrono::{Days, NaiveDate, NaiveTime, TimeZone, Utc};
use core_library::{CandidateCursor, CandidateFilter, MediaRecord, MediaRepository};
use core_runtime::config::MirrorConfig;
use filetime::FileTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::{Id as TaskId, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::quarantine::QuarantineLedger;

const TEMP_FILE_PREFIX: &str = ".gphotos-";
const TEMP_FILE_SUFFIX: &str = ".part";
const COPY_BUFFER_SIZE: usize = 64 * 1024;

// =============================================================================
// Options and statistics
// =============================================================================

/// Parameters of one download run
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Mirror root; record paths are resolved against it
    pub root: PathBuf,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub include_video: bool,
    /// Reconsider records already marked downloaded
    pub retry_download: bool,
    pub photo_timeout: Duration,
    pub video_timeout: Duration,
    pub max_concurrent_downloads: usize,
    pub batch_size: usize,
}

impl From<&MirrorConfig> for DownloadOptions {
    fn from(config: &MirrorConfig) -> Self {
        Self {
            root: config.root_folder.clone(),
            start_date: config.start_date,
            end_date: config.end_date,
            include_video: config.include_video,
            retry_download: config.retry_download,
            photo_timeout: config.photo_timeout,
            video_timeout: config.video_timeout,
            max_concurrent_downloads: config.max_concurrent_downloads,
            batch_size: config.batch_size,
        }
    }
}

impl DownloadOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            start_date: None,
            end_date: None,
            include_video: true,
            retry_download: false,
            photo_timeout: Duration::from_secs(60),
            video_timeout: Duration::from_secs(2000),
            max_concurrent_downloads: 20,
            batch_size: 40,
        }
    }

    /// Transfer timeout for an item of `kind`
    pub fn timeout_for(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Photo => self.photo_timeout,
            MediaKind::Video => self.video_timeout,
        }
    }

    /// Store filter selecting this run's candidates. The end date is inclusive,
    /// so the bound becomes midnight of the following day.
    pub fn candidate_filter(&self) -> CandidateFilter {
        let midnight = |date: NaiveDate| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));

        CandidateFilter {
            start: self.start_date.map(midnight),
            end: self
                .end_date
                .and_then(|date| date.checked_add_days(Days::new(1)))
                .map(midnight),
            include_video: self.include_video,
            include_downloaded: self.retry_download,
        }
    }
}

/// Counters for one download run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadStats {
    pub downloaded: u64,
    pub failed: u64,
    /// Files found on disk without a transfer
    pub already_present: u64,
    /// Candidates skipped because they are quarantined
    pub skipped_quarantined: u64,
    /// Items newly added to the ledger during this run
    pub quarantined: u64,
    /// Items the catalog did not resolve to a download URL
    pub unresolved: u64,
}

// =============================================================================
// Worker
// =============================================================================

/// Why a single transfer failed
#[derive(Error, Debug)]
pub enum DownloadFailure {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadFailure {
    /// Only a rejection by the remote marks an item as permanently broken
    pub fn is_quarantine_eligible(&self) -> bool {
        matches!(self, DownloadFailure::Http { .. })
    }
}

impl From<BridgeError> for DownloadFailure {
    fn from(error: BridgeError) -> Self {
        match error {
            // Retryable statuses only reach here once the transport gave up on them
            BridgeError::HttpStatus { status, message }
                if RetryPolicy::is_retryable_status(status) =>
            {
                DownloadFailure::Network(format!("HTTP {status} after retries: {message}"))
            }
            BridgeError::HttpStatus { status, message } => DownloadFailure::Http { status, message },
            BridgeError::Io(e) => DownloadFailure::Io(e),
            BridgeError::Cancelled => DownloadFailure::Cancelled,
            BridgeError::Network(message) => DownloadFailure::Network(message),
            other => DownloadFailure::Network(other.to_string()),
        }
    }
}

/// Immutable inputs of one transfer
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub record: MediaRecord,
    pub url: String,
    pub destination: PathBuf,
    pub timeout: Duration,
}

/// Transfer one item to its destination.
///
/// The body is streamed into a temporary file in the destination folder and
/// renamed into place only after the whole body arrived. On failure or
/// cancellation the temporary file is removed when it is dropped.
pub async fn download_one(
    http: Arc<dyn HttpClient>,
    task: DownloadTask,
    cancellation: CancellationToken,
) -> std::result::Result<(), DownloadFailure> {
    tokio::select! {
        _ = cancellation.cancelled() => Err(DownloadFailure::Cancelled),
        outcome = tokio::time::timeout(task.timeout, transfer(http.as_ref(), &task)) => match outcome {
            Ok(result) => result,
            Err(_) => Err(DownloadFailure::Network(format!(
                "transfer timed out after {}s",
                task.timeout.as_secs()
            ))),
        },
    }
}

async fn transfer(
    http: &dyn HttpClient,
    task: &DownloadTask,
) -> std::result::Result<(), DownloadFailure> {
    let folder = task
        .destination
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let request = HttpRequest::get(task.url.as_str()).timeout(task.timeout);
    let mut body = http.download_stream(request).await?;

    let temp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .suffix(TEMP_FILE_SUFFIX)
        .tempfile_in(&folder)?;
    let (file, temp_path) = temp.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = body
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadFailure::Network(format!("body read failed: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n]).await?;
        written += n as u64;
    }
    file.sync_all().await?;
    drop(file);

    temp_path
        .persist(&task.destination)
        .map_err(|e| DownloadFailure::Io(e.error))?;

    let accessed = FileTime::from_unix_time(task.record.modified_at.timestamp(), 0);
    let modified = FileTime::from_unix_time(task.record.created_at.timestamp(), 0);
    if let Err(e) = filetime::set_file_times(&task.destination, accessed, modified) {
        warn!(path = %task.destination.display(), error = %e, "Failed to set file times");
    }

    debug!(id = %task.record.id, bytes = written, path = %task.destination.display(), "Transfer complete");
    Ok(())
}

// =============================================================================
// Worker pool
// =============================================================================

type Outcome = std::result::Result<(), DownloadFailure>;

/// Bounded set of running transfers, keyed back to their tasks
struct WorkerPool {
    workers: JoinSet<Outcome>,
    in_flight: HashMap<TaskId, DownloadTask>,
    capacity: usize,
}

impl WorkerPool {
    fn new(capacity: usize) -> Self {
        Self {
            workers: JoinSet::new(),
            in_flight: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn is_full(&self) -> bool {
        self.in_flight.len() >= self.capacity
    }

    fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    fn spawn(&mut self, task: DownloadTask, http: Arc<dyn HttpClient>, token: CancellationToken) {
        let handle = self
            .workers
            .spawn(download_one(http, task.clone(), token));
        self.in_flight.insert(handle.id(), task);
    }

    /// Wait for the next worker to finish. `None` once the pool is empty.
    async fn join_next(&mut self) -> Option<(DownloadTask, Outcome)> {
        loop {
            let (id, outcome) = match self.workers.join_next_with_id().await? {
                Ok((id, outcome)) => (id, outcome),
                Err(e) => (
                    e.id(),
                    Err(DownloadFailure::Network(format!("download worker failed: {}", e))),
                ),
            };
            if let Some(task) = self.in_flight.remove(&id) {
                return Some((task, outcome));
            }
        }
    }

    /// Abort every running transfer and wait for them to unwind
    async fn shutdown(&mut self) {
        self.workers.shutdown().await;
        self.in_flight.clear();
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Run-scoped mutable state, owned by the coordinator
struct RunState {
    pool: WorkerPool,
    ledger: QuarantineLedger,
    stats: DownloadStats,
}

/// Downloads every pending record of the index
pub struct DownloadOrchestrator {
    catalog: Arc<dyn MediaCatalog>,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn MediaRepository>,
    options: DownloadOptions,
    cancellation: CancellationToken,
}

impl DownloadOrchestrator {
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn MediaRepository>,
        options: DownloadOptions,
    ) -> Self {
        Self {
            catalog,
            http,
            store,
            options,
            cancellation: CancellationToken::new(),
        }
    }

    /// Abort the run once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Download all candidates.
    ///
    /// The quarantine ledger is stored and the summary logged whether the run
    /// completes or not.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Store`] when the index cannot be read or updated
    /// - [`SyncError::Cancelled`] when the token fires; in-flight transfers are
    ///   aborted without touching the ledger
    #[instrument(skip(self), fields(
        root = %self.options.root.display(),
        workers = self.options.max_concurrent_downloads,
        batch_size = self.options.batch_size
    ))]
    pub async fn run(&self) -> Result<DownloadStats> {
        let mut state = RunState {
            pool: WorkerPool::new(self.options.max_concurrent_downloads),
            ledger: QuarantineLedger::in_root(&self.options.root)?,
            stats: DownloadStats::default(),
        };

        info!("Downloading pending media");

        let mut outcome = self.run_batches(&mut state).await;
        if outcome.is_ok() {
            outcome = self.drain(&mut state).await;
        }
        if outcome.is_err() {
            state.pool.shutdown().await;
        }

        if let Err(e) = state.ledger.store() {
            error!(error = %e, "Failed to store quarantine ledger");
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
        state.ledger.report();

        let stats = state.stats;
        warn!(
            "Downloaded {} items, failed {}, already present {}",
            stats.downloaded, stats.failed, stats.already_present
        );

        outcome.map(|()| stats)
    }

    async fn run_batches(&self, state: &mut RunState) -> Result<()> {
        let filter = self.options.candidate_filter();
        let limit = self.options.batch_size.max(1);
        let mut cursor: Option<CandidateCursor> = None;

        loop {
            if self.cancellation.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let candidates = self
                .store
                .find_candidates(&filter, cursor.as_ref(), limit as u32)
                .await?;
            let Some(last) = candidates.last() else {
                break;
            };
            cursor = Some(last.cursor());
            let exhausted = candidates.len() < limit;

            let mut batch = Vec::with_capacity(candidates.len());
            for record in candidates {
                if tokio::fs::try_exists(record.local_path(&self.options.root))
                    .await
                    .unwrap_or(false)
                {
                    if !record.downloaded {
                        self.store.mark_downloaded(&record.id).await?;
                    }
                    state.stats.already_present += 1;
                    continue;
                }
                if !state.ledger.check_ok(&record.id) {
                    debug!(id = %record.id, "Skipping quarantined item");
                    state.stats.skipped_quarantined += 1;
                    continue;
                }
                batch.push(record);
            }

            if !batch.is_empty() {
                self.resolve_batch(batch, state).await?;
            }

            if exhausted {
                break;
            }
        }

        Ok(())
    }

    async fn resolve_batch(&self, batch: Vec<MediaRecord>, state: &mut RunState) -> Result<()> {
        let ids: Vec<String> = batch.iter().map(|r| r.id.clone()).collect();

        let response = match self.catalog.batch_get(&ids).await {
            Ok(response) => response,
            Err(BridgeError::Cancelled) => return Err(SyncError::Cancelled),
            Err(e) => {
                warn!(items = ids.len(), error = %e, "Batch lookup failed, resolving items one by one");
                return self.resolve_individually(batch, state).await;
            }
        };

        if response.truncated {
            error!(requested = ids.len(), "Batch size too big, some items dropped");
        }

        let mut results: HashMap<String, BatchItemResult> = response
            .results
            .into_iter()
            .map(|result| (result.id.clone(), result))
            .collect();

        for record in batch {
            match results.remove(&record.id) {
                Some(BatchItemResult { item: Some(item), .. }) => match item.download_url() {
                    Some(url) => self.submit(record, url, state).await?,
                    None => {
                        warn!(id = %record.id, "No download URL for item");
                        state.stats.unresolved += 1;
                    }
                },
                Some(BatchItemResult {
                    status: Some(status),
                    ..
                }) => {
                    warn!(
                        id = %record.id,
                        code = status.code,
                        message = %status.message,
                        "Item not resolved by batch lookup"
                    );
                    state.stats.unresolved += 1;
                }
                Some(_) => {
                    warn!(id = %record.id, "Null response for item");
                    state.stats.unresolved += 1;
                }
                None => {
                    warn!(id = %record.id, "Item missing from batch response");
                    state.stats.unresolved += 1;
                }
            }
        }

        Ok(())
    }

    async fn resolve_individually(
        &self,
        batch: Vec<MediaRecord>,
        state: &mut RunState,
    ) -> Result<()> {
        for record in batch {
            if self.cancellation.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match self.catalog.get(&record.id).await {
                Ok(item) => match item.download_url() {
                    Some(url) => self.submit(record, url, state).await?,
                    None => {
                        warn!(id = %record.id, "No download URL for item");
                        state.stats.unresolved += 1;
                    }
                },
                Err(BridgeError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    error!(id = %record.id, error = %e, "Item lookup failed");
                    let path = record.relative_path().to_string_lossy().into_owned();
                    if state.ledger.add(path, &record.id, e.to_string()) {
                        state.stats.quarantined += 1;
                    }
                    state.stats.failed += 1;
                }
            }
        }

        Ok(())
    }

    async fn submit(&self, record: MediaRecord, url: String, state: &mut RunState) -> Result<()> {
        let folder = record.local_folder(&self.options.root);
        if let Err(e) = tokio::fs::create_dir_all(&folder).await {
            error!(id = %record.id, folder = %folder.display(), error = %e, "Cannot create destination folder");
            state.stats.failed += 1;
            return Ok(());
        }

        while state.pool.is_full() {
            self.collect_one(state).await?;
        }

        let task = DownloadTask {
            destination: record.local_path(&self.options.root),
            timeout: self.options.timeout_for(record.kind),
            url,
            record,
        };
        debug!(id = %task.record.id, path = %task.destination.display(), "Submitting download");
        state
            .pool
            .spawn(task, Arc::clone(&self.http), self.cancellation.child_token());

        Ok(())
    }

    async fn drain(&self, state: &mut RunState) -> Result<()> {
        while !state.pool.is_empty() {
            self.collect_one(state).await?;
        }
        Ok(())
    }

    /// Wait for one worker and record its outcome
    async fn collect_one(&self, state: &mut RunState) -> Result<()> {
        let finished = tokio::select! {
            _ = self.cancellation.cancelled() => return Err(SyncError::Cancelled),
            finished = state.pool.join_next() => finished,
        };

        match finished {
            Some((task, outcome)) => self.settle(task, outcome, state).await,
            None => Ok(()),
        }
    }

    async fn settle(&self, task: DownloadTask, outcome: Outcome, state: &mut RunState) -> Result<()> {
        let record = task.record;
        match outcome {
            Ok(()) => {
                self.store.mark_downloaded(&record.id).await?;
                state.stats.downloaded += 1;
                debug!(id = %record.id, "Downloaded");
            }
            Err(DownloadFailure::Cancelled) => return Err(SyncError::Cancelled),
            Err(failure) => {
                state.stats.failed += 1;
                error!(
                    id = %record.id,
                    path = %record.relative_path().display(),
                    error = %failure,
                    "Download failed"
                );
                if failure.is_quarantine_eligible() {
                    let path = record.relative_path().to_string_lossy().into_owned();
                    if state.ledger.add(path, &record.id, failure.to_string()) {
                        state.stats.quarantined += 1;
                    }
                }
            }
        }
        Ok(())
    }
}
