/// Status code carried in RPC response envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Cancelled,
    NotFound,
    InternalError,
    Timeout,
    TooManyTasks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub error_msgs: Vec<String>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            error_msgs: vec![],
        }
    }

    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            error_msgs: vec![message.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

/// A snapshot as returned by the source frontend and handed to a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotResponse {
    /// Snapshot metadata blob.
    pub meta: Vec<u8>,
    /// JSON job-info blob; absent if the backup job has no info.
    pub job_info: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginTxnResponse {
    pub txn_id: i64,
    pub db_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueId {
    pub hi: i64,
    pub lo: i64,
}

/// Ask a destination backend to pull one tablet's binlog version from a source backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestBinlogRequest {
    pub txn_id: i64,
    pub remote_tablet_id: i64,
    pub binlog_version: i64,
    pub remote_host: String,
    pub remote_port: String,
    pub partition_id: i64,
    pub local_tablet_id: i64,
    pub load_id: UniqueId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestBinlogResponse {
    pub status: Option<Status>,
}
