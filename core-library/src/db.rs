//! # Index Database
//!
//! Opens the SQLite file holding the mirror index and applies the embedded
//! migrations.
//!
//! The index lives next to the mirrored files (`<root>/gphotos.sqlite` by
//! default) and is opened in WAL mode: the indexer checkpoints it periodically
//! so an interrupted scan loses at most one checkpoint interval of work.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("/srv/mirror/gphotos.sqlite")).await?;
//! ```
//!
//! Tests use [`create_test_pool`], an in-memory index with the schema applied.

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the index is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    /// Private in-memory database, lost when the pool closes
    Memory,
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Connection settings for the index database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,

    /// The engine writes from a single task; extra connections serve reads
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,

    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Duration,

    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// Index stored in the file at `database_path`
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(database_path.into()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(10),
            statement_cache_capacity: 64,
        }
    }

    /// Index kept in memory.
    ///
    /// Every connection to `:memory:` opens its own database, so the pool is
    /// pinned to one connection that is never recycled.
    pub fn in_memory() -> Self {
        Self {
            location: DatabaseLocation::Memory,
            max_connections: 1,
            ..Self::new(PathBuf::new())
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        if self.location != DatabaseLocation::Memory {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            DatabaseLocation::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            DatabaseLocation::Memory => SqliteConnectOptions::new().in_memory(true),
        };

        options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .statement_cache_capacity(self.statement_cache_capacity)
    }
}

/// Open the index, creating the file and its folder when missing, and bring
/// its schema up to date.
///
/// # Errors
///
/// - [`LibraryError::Io`] when the parent folder cannot be created
/// - [`LibraryError::Database`] when the file cannot be opened
/// - [`LibraryError::Migration`] when the schema cannot be applied
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    info!(
        location = %config.location,
        max_connections = config.max_connections,
        "Opening index database"
    );

    if let DatabaseLocation::File(path) = &config.location {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut pool_options = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);
    if config.location == DatabaseLocation::Memory {
        pool_options = pool_options.max_lifetime(None).idle_timeout(None);
    }

    let pool = pool_options
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(location = %config.location, error = %e, "Failed to open index database");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    debug!(connections = pool.size(), "Index database ready");
    Ok(pool)
}

/// In-memory index with the schema applied
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Index migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    debug!("Index schema up to date");
    Ok(())
}

async fn health_check(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(LibraryError::Database)?;
    Ok(())
}
