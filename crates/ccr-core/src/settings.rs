use std::time::Duration;

/// Tunables for the synchronization engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Time between two sync ticks of a job.
    pub sync_interval: Duration,
    /// Sleep between two backup/restore status checks.
    pub poll_interval: Duration,
    /// Number of status checks before a wait is abandoned.
    pub poll_max_retries: u32,
    /// First delay of the progress write retry loop.
    pub progress_retry_base: Duration,
    /// Upper bound of the progress write retry delay.
    pub progress_retry_max: Duration,
    /// Attempts for Job Store reads before the error surfaces.
    pub store_read_attempts: u32,
    /// Maximum ingest RPCs in flight for one upsert.
    pub ingest_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(5),
            poll_interval: Duration::from_secs(3),
            poll_max_retries: 20,
            progress_retry_base: Duration::from_secs(3),
            progress_retry_max: Duration::from_secs(60),
            store_read_attempts: 3,
            ingest_concurrency: 64,
        }
    }
}
