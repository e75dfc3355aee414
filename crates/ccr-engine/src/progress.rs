//! Retrying access to job definitions and progress records.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ccr_core::{JobDefinition, JobProgress, SyncSettings};
use ccr_state::{JobStore, StateError, StateResult};
use tracing::{debug, error, info, warn};

use crate::error::SyncResult;

/// Whether progress writes are currently going through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistHealth {
    Healthy,
    /// The last `consecutive_failures` writes failed and are being retried.
    Degraded { consecutive_failures: u32 },
}

/// Job Store access with the retry policy of the sync engine.
///
/// Reads are retried a bounded number of times before the error surfaces.
/// Progress writes never fail on store errors: they back off exponentially
/// until the write lands, and report the failure streak through [`health`].
///
/// [`health`]: ProgressStore::health
#[derive(Clone)]
pub struct ProgressStore {
    store: Arc<dyn JobStore>,
    read_attempts: u32,
    retry_base: Duration,
    retry_max: Duration,
    failures: Arc<AtomicU32>,
}

impl ProgressStore {
    pub fn new(store: Arc<dyn JobStore>, settings: &SyncSettings) -> Self {
        Self {
            store,
            read_attempts: settings.store_read_attempts.max(1),
            retry_base: settings.progress_retry_base,
            retry_max: settings.progress_retry_max,
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn job_exists(&self, name: &str) -> SyncResult<bool> {
        self.read("job_exists", name, || self.store.job_exists(name))
    }

    pub fn progress_exists(&self, name: &str) -> SyncResult<bool> {
        self.read("progress_exists", name, || self.store.progress_exists(name))
    }

    /// Load and decode the progress record of `name`.
    pub fn load(&self, name: &str) -> SyncResult<Option<JobProgress>> {
        let Some(data) = self.read("get_progress", name, || self.store.get_progress(name))? else {
            return Ok(None);
        };
        Ok(Some(JobProgress::from_json(&data)?))
    }

    /// Persist the whole progress record, retrying until the store accepts it.
    pub async fn save(&self, name: &str, progress: &JobProgress) -> SyncResult<()> {
        let data = progress.to_json()?;
        let mut attempt: u32 = 0;

        loop {
            match self.store.update_progress(name, &data) {
                Ok(()) => {
                    let streak = self.failures.swap(0, Ordering::SeqCst);
                    if streak > 0 {
                        info!(job = name, failed_attempts = streak, "Progress write recovered");
                    }
                    debug!(job = name, commit_seq = progress.commit_seq, "Persisted progress");
                    return Ok(());
                }
                Err(e) => {
                    let streak = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                    let delay = self.backoff(attempt);
                    let delay_ms = delay.as_millis() as u64;
                    if e.is_transient() {
                        warn!(
                            job = name,
                            attempt = attempt + 1,
                            delay_ms,
                            error = %e,
                            "Progress write failed, retrying"
                        );
                    } else {
                        error!(
                            job = name,
                            attempt = attempt + 1,
                            consecutive_failures = streak,
                            delay_ms,
                            error = %e,
                            "Progress write failed, retrying"
                        );
                    }
                    tokio::time::sleep(delay).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    /// Overwrite the stored definition of `def`, registering it if absent.
    pub fn save_job(&self, def: &JobDefinition) -> SyncResult<()> {
        let data = def.to_json()?;
        self.read("update_job", &def.name, || {
            match self.store.update_job(&def.name, &data) {
                Err(StateError::NotFound(_)) => self.store.add_job(&def.name, &data),
                other => other,
            }
        })
    }

    pub fn health(&self) -> PersistHealth {
        match self.failures.load(Ordering::SeqCst) {
            0 => PersistHealth::Healthy,
            n => PersistHealth::Degraded {
                consecutive_failures: n,
            },
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }

    fn read<T>(&self, op: &str, name: &str, f: impl Fn() -> StateResult<T>) -> SyncResult<T> {
        let mut attempt = 1;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.read_attempts => {
                    warn!(job = name, op, attempt, error = %e, "Job store read failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccr_state::SqliteJobStore;
    use std::sync::atomic::AtomicUsize;

    /// Fails the first N reads and writes, then delegates to SQLite.
    struct FlakyStore {
        inner: SqliteJobStore,
        failing_reads: AtomicUsize,
        failing_writes: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failing_reads: usize, failing_writes: usize) -> Self {
            Self {
                inner: SqliteJobStore::in_memory().unwrap(),
                failing_reads: AtomicUsize::new(failing_reads),
                failing_writes: AtomicUsize::new(failing_writes),
            }
        }

        fn trip(counter: &AtomicUsize) -> StateResult<()> {
            let remaining = counter.load(Ordering::SeqCst);
            if remaining > 0 {
                counter.store(remaining - 1, Ordering::SeqCst);
                return Err(StateError::Poisoned);
            }
            Ok(())
        }
    }

    impl JobStore for FlakyStore {
        fn job_exists(&self, name: &str) -> StateResult<bool> {
            Self::trip(&self.failing_reads)?;
            self.inner.job_exists(name)
        }
        fn add_job(&self, name: &str, job_info: &str) -> StateResult<()> {
            self.inner.add_job(name, job_info)
        }
        fn update_job(&self, name: &str, job_info: &str) -> StateResult<()> {
            self.inner.update_job(name, job_info)
        }
        fn get_job(&self, name: &str) -> StateResult<Option<String>> {
            self.inner.get_job(name)
        }
        fn list_jobs(&self) -> StateResult<Vec<(String, String)>> {
            self.inner.list_jobs()
        }
        fn remove_job(&self, name: &str) -> StateResult<()> {
            self.inner.remove_job(name)
        }
        fn progress_exists(&self, name: &str) -> StateResult<bool> {
            Self::trip(&self.failing_reads)?;
            self.inner.progress_exists(name)
        }
        fn get_progress(&self, name: &str) -> StateResult<Option<String>> {
            Self::trip(&self.failing_reads)?;
            self.inner.get_progress(name)
        }
        fn update_progress(&self, name: &str, progress: &str) -> StateResult<()> {
            Self::trip(&self.failing_writes)?;
            self.inner.update_progress(name, progress)
        }
    }

    fn progress_store(store: FlakyStore) -> ProgressStore {
        ProgressStore::new(Arc::new(store), &SyncSettings::default())
    }

    #[test]
    fn test_reads_retry_within_budget() {
        let store = progress_store(FlakyStore::new(2, 0));
        assert!(!store.progress_exists("t1").unwrap());
    }

    #[test]
    fn test_reads_surface_after_budget() {
        let store = progress_store(FlakyStore::new(3, 0));
        assert!(store.progress_exists("t1").is_err());
        // The budget was consumed by the failed call.
        assert!(!store.progress_exists("t1").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_retries_until_written() {
        let store = progress_store(FlakyStore::new(0, 4));
        let mut progress = JobProgress::new();
        progress.done_full_sync(17);

        store.save("t1", &progress).await.unwrap();

        assert_eq!(store.health(), PersistHealth::Healthy);
        assert_eq!(store.load("t1").unwrap(), Some(progress));
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_reports_failure_streak() {
        let store = progress_store(FlakyStore::new(0, 100));
        let writer = store.clone();

        let handle = tokio::spawn(async move {
            writer.save("t1", &JobProgress::new()).await.unwrap();
        });

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(matches!(
            store.health(),
            PersistHealth::Degraded { consecutive_failures } if consecutive_failures >= 3
        ));

        handle.abort();
    }

    #[test]
    fn test_backoff_is_capped() {
        let store = progress_store(FlakyStore::new(0, 0));
        assert_eq!(store.backoff(0), Duration::from_secs(3));
        assert_eq!(store.backoff(1), Duration::from_secs(6));
        assert_eq!(store.backoff(2), Duration::from_secs(12));
        assert_eq!(store.backoff(5), Duration::from_secs(60));
        assert_eq!(store.backoff(40), Duration::from_secs(60));
    }

    #[test]
    fn test_save_job_registers_missing_definition() {
        let store = progress_store(FlakyStore::new(0, 0));
        let spec = ccr_core::Spec {
            host: "h".into(),
            port: 1,
            thrift_port: 2,
            user: "root".into(),
            database: "db".into(),
            table: "t".into(),
            ..Default::default()
        };
        let mut def = JobDefinition::new("t1", spec.clone(), spec).unwrap();

        store.save_job(&def).unwrap();
        def.dest.table_id = 99;
        store.save_job(&def).unwrap();

        let stored = store.store().get_job("t1").unwrap().unwrap();
        assert_eq!(JobDefinition::from_json(&stored).unwrap().dest.table_id, 99);
    }
}
