//! # Mirror Sync Engine
//!
//! Keeps a local folder in step with a remote photo library.
//!
//! ## Phases
//!
//! - **Indexer** (`indexer`): pages through the catalog and records every item,
//!   with its local path, in the metadata store
//! - **Download Orchestrator** (`downloader`): fetches pending items through a
//!   bounded worker pool with atomic writes
//! - **Quarantine Ledger** (`quarantine`): persistent set of items that failed
//!   permanently and are no longer attempted
//! - **Reconciler** (`reconciler`): removes local files the index no longer
//!   knows about
//!
//! Each phase takes its collaborators as trait objects
//! ([`MediaCatalog`](bridge_traits::MediaCatalog),
//! [`HttpClient`](bridge_traits::HttpClient),
//! [`MediaRepository`](core_library::MediaRepository)) and an optional
//! cancellation token.

pub mod downloader;
pub mod error;
pub mod indexer;
pub mod quarantine;
pub mod reconciler;

pub use downloader::{
    download_one, DownloadFailure, DownloadOptions, DownloadOrchestrator, DownloadStats,
    DownloadTask,
};
pub use error::{Result, SyncError};
pub use indexer::{IndexOptions, IndexStats, Indexer};
pub use quarantine::{QuarantineEntry, QuarantineLedger, LEDGER_FILE_NAME};
pub use reconciler::{ReconcileStats, Reconciler};
pub use tokio_util::sync::CancellationToken;
