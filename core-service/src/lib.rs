//! Mirror service façade and bootstrap helpers.
//!
//! This crate wires the collaborators (remote catalog, HTTP client, metadata
//! store) into the sync engine and runs its phases in order. Desktop hosts
//! enable the `desktop-shims` feature (which depends on `bridge-desktop` and the
//! Google Photos provider) and call [`bootstrap_desktop`]; tests and other
//! hosts assemble [`MirrorDependencies`] themselves.

pub mod error;

pub use error::{Result, ServiceError};

use std::sync::Arc;

use bridge_traits::{catalog::MediaCatalog, http::HttpClient};
use core_library::MediaRepository;
use core_runtime::MirrorConfig;
use core_sync::{
    DownloadOptions, DownloadOrchestrator, DownloadStats, IndexOptions, IndexStats, Indexer,
    ReconcileStats, Reconciler,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Aggregated handle to the collaborators the engine requires.
pub struct MirrorDependencies {
    pub catalog: Arc<dyn MediaCatalog>,
    pub http_client: Arc<dyn HttpClient>,
    pub store: Arc<dyn MediaRepository>,
}

impl MirrorDependencies {
    /// Construct a dependency bundle from explicit handles.
    pub fn new(
        catalog: Arc<dyn MediaCatalog>,
        http_client: Arc<dyn HttpClient>,
        store: Arc<dyn MediaRepository>,
    ) -> Self {
        Self {
            catalog,
            http_client,
            store,
        }
    }
}

/// Statistics of the phases a [`MirrorService::sync`] call ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub index: Option<IndexStats>,
    pub download: Option<DownloadStats>,
    pub reconcile: Option<ReconcileStats>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct MirrorService {
    config: Arc<MirrorConfig>,
    deps: Arc<MirrorDependencies>,
    cancellation: CancellationToken,
}

impl MirrorService {
    /// Create a new service from a validated configuration and its dependencies.
    pub fn new(config: MirrorConfig, deps: MirrorDependencies) -> Self {
        Self {
            config: Arc::new(config),
            deps: Arc::new(deps),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Access the dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<MirrorDependencies> {
        Arc::clone(&self.deps)
    }

    /// Token shared by every phase; cancelling it interrupts the running phase.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Scan the remote library into the index.
    pub async fn index(&self) -> Result<IndexStats> {
        let indexer = Indexer::new(
            Arc::clone(&self.deps.catalog),
            Arc::clone(&self.deps.store),
            IndexOptions::from(self.config.as_ref()),
        )
        .with_cancellation(self.cancellation.clone());

        Ok(indexer.run().await?)
    }

    /// Download every pending item.
    pub async fn download(&self) -> Result<DownloadStats> {
        let orchestrator = DownloadOrchestrator::new(
            Arc::clone(&self.deps.catalog),
            Arc::clone(&self.deps.http_client),
            Arc::clone(&self.deps.store),
            DownloadOptions::from(self.config.as_ref()),
        )
        .with_cancellation(self.cancellation.clone());

        Ok(orchestrator.run().await?)
    }

    /// Delete local files the index no longer knows about.
    pub async fn reconcile(&self) -> Result<ReconcileStats> {
        let reconciler = Reconciler::new(
            Arc::clone(&self.deps.store),
            self.config.root_folder.clone(),
            self.config.media_folder.clone(),
        )
        .with_cancellation(self.cancellation.clone());

        Ok(reconciler.run().await?)
    }

    /// Run the configured phases in order: index, download, reconcile.
    ///
    /// The first failing phase ends the run.
    #[instrument(skip(self), fields(root = %self.config.root_folder.display()))]
    pub async fn sync(&self) -> Result<SyncReport> {
        let phases = self.config.phases;
        let mut report = SyncReport::default();

        if phases.index {
            report.index = Some(self.index().await?);
        }
        if phases.download {
            report.download = Some(self.download().await?);
        }
        if phases.reconcile {
            report.reconcile = Some(self.reconcile().await?);
        }

        info!(
            indexed = report.index.as_ref().map_or(0, |s| s.inserted),
            downloaded = report.download.as_ref().map_or(0, |s| s.downloaded),
            deleted = report.reconcile.as_ref().map_or(0, |s| s.deleted),
            "Sync finished"
        );
        Ok(report)
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Opens (or creates) the index at `config.database_path` and talks to the
/// Google Photos Library API with `access_token`.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::MirrorConfig;
/// use core_service::bootstrap_desktop;
///
/// let config = MirrorConfig::builder().root_folder("/srv/photos").build()?;
/// let service = bootstrap_desktop(config, "ya29.token").await?;
/// let report = service.sync().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    config: MirrorConfig,
    access_token: impl Into<String>,
) -> Result<MirrorService> {
    use bridge_desktop::ReqwestHttpClient;
    use core_library::{create_pool, DatabaseConfig, SqliteMediaRepository};
    use provider_google_photos::GooglePhotosConnector;

    let http_client: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::with_pool_size(config.max_concurrent_downloads)
            .map_err(|err| ServiceError::InitializationFailed(err.to_string()))?,
    );
    let catalog = Arc::new(GooglePhotosConnector::new(
        Arc::clone(&http_client),
        access_token.into(),
    ));
    let pool = create_pool(DatabaseConfig::new(config.database_path.clone())).await?;
    let store = Arc::new(SqliteMediaRepository::new(pool));

    info!(database = %config.database_path.display(), "Mirror service ready");
    Ok(MirrorService::new(
        config,
        MirrorDependencies::new(catalog, http_client, store),
    ))
}
