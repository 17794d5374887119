//! Error types for collector runs.

use inventory_sync_protocol::FilterRef;

/// Remote operation that failed, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    CreateFilter,
    WaitForUpdates,
    DestroyFilter,
}

impl RemoteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteOperation::CreateFilter => "CreateFilter",
            RemoteOperation::WaitForUpdates => "WaitForUpdatesEx",
            RemoteOperation::DestroyFilter => "DestroyPropertyFilter",
        }
    }
}

impl std::fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The remote side rejected a call or the transport failed. Never retried here.
    #[error("Remote call {operation} failed: {source}")]
    RemoteProtocol {
        operation: RemoteOperation,
        #[source]
        source: anyhow::Error,
    },

    /// The entity store failed; treated as systemic and aborts the run.
    #[error("Entity store error: {0}")]
    Store(#[source] anyhow::Error),

    /// Destroying the filter failed. Logged by the collector, never returned from a run.
    #[error("Failed to destroy filter {filter}: {source}")]
    Teardown {
        filter: FilterRef,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid traversal graph: {0}")]
    InvalidTraversal(String),

    #[error("Collector is already running")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Config(#[from] inventory_sync_config::ConfigError),
}

impl SyncError {
    pub(crate) fn remote(operation: RemoteOperation, source: anyhow::Error) -> Self {
        SyncError::RemoteProtocol { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
