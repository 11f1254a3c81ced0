use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] BridgeError),

    #[error("Store error: {0}")]
    Store(#[from] LibraryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Quarantine ledger error: {0}")]
    Ledger(String),

    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Map a collaborator error, keeping cancellation distinguishable
    pub(crate) fn from_catalog(error: BridgeError) -> Self {
        match error {
            BridgeError::Cancelled => SyncError::Cancelled,
            other => SyncError::Catalog(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
