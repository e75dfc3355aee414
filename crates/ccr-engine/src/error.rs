use ccr_rpc::RpcError;
use ccr_state::StateError;
use thiserror::Error;

/// Errors raised by the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed job definition. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job {0} already exists")]
    AlreadyExists(String),

    /// A first-run check on the clusters failed.
    #[error("preflight check failed: {0}")]
    Preflight(String),

    /// Malformed or missing data in a remote response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Source and destination tablet layouts do not line up.
    #[error("topology mismatch: {0}")]
    TopologyMismatch(String),

    #[error("partition not found: {0}")]
    PartitionNotFound(String),

    #[error("unknown binlog type: {0}")]
    UnknownBinlogType(i32),

    #[error("ingest failed: {0}")]
    Ingest(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StateError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<ccr_core::Error> for SyncError {
    fn from(e: ccr_core::Error) -> Self {
        use ccr_core::Error;

        match e {
            Error::InvalidSpec(msg) | Error::InvalidJob(msg) => SyncError::Validation(msg),
            Error::UnknownBinlogType(tag) => SyncError::UnknownBinlogType(tag),
            Error::SerializationError(e) => SyncError::Serialization(e),
            other @ (Error::MalformedRecord { .. }
            | Error::MissingJobInfoField(_)
            | Error::JobInfoNotObject) => SyncError::Protocol(other.to_string()),
        }
    }
}

impl SyncError {
    /// Failures that are expected to clear up on their own by the next tick.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Rpc(e) => e.is_retryable(),
            SyncError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
