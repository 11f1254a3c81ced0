use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

impl ServiceError {
    /// The run was interrupted through the service's cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Sync(core_sync::SyncError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
