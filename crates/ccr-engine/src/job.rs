use std::sync::Arc;

use ccr_core::{JobDefinition, JobProgress, Spec, SyncSettings, SyncType};
use ccr_rpc::Cluster;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::progress::{PersistHealth, ProgressStore};

/// Run state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    /// Stop requested; the current tick finishes first.
    Stopping,
    Stopped,
}

/// Requests a running job to stop. Cloneable, and safe to call repeatedly.
#[derive(Clone)]
pub struct StopHandle {
    lifecycle: Arc<watch::Sender<Lifecycle>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.lifecycle.send_if_modified(|state| match state {
            Lifecycle::Running => {
                *state = Lifecycle::Stopping;
                true
            }
            Lifecycle::Idle => {
                *state = Lifecycle::Stopped;
                true
            }
            Lifecycle::Stopping | Lifecycle::Stopped => false,
        });
    }

    pub fn state(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Wait until the run loop has exited.
    pub async fn stopped(&self) {
        let mut rx = self.lifecycle.subscribe();
        let _ = rx.wait_for(|state| *state == Lifecycle::Stopped).await;
    }
}

/// Check that `name` is free and build a validated definition.
pub fn validate_new_job(
    name: &str,
    src: Spec,
    dest: Spec,
    progress_store: &ProgressStore,
) -> SyncResult<JobDefinition> {
    if progress_store.job_exists(name)? {
        return Err(SyncError::AlreadyExists(name.to_string()));
    }
    Ok(JobDefinition::new(name, src, dest)?)
}

/// One replication job: a definition, its progress, and clients for both clusters.
pub struct Job<C: Cluster> {
    pub(crate) def: JobDefinition,
    pub(crate) src: C,
    pub(crate) dest: C,
    /// `None` until loaded from the store on the first tick of a resumed job.
    pub(crate) progress: Option<JobProgress>,
    pub(crate) progress_store: ProgressStore,
    pub(crate) settings: SyncSettings,
    lifecycle: Arc<watch::Sender<Lifecycle>>,
}

impl<C: Cluster> Job<C> {
    /// Create a new job with blank progress.
    pub fn create(
        name: &str,
        src_spec: Spec,
        dest_spec: Spec,
        src: C,
        dest: C,
        progress_store: ProgressStore,
        settings: SyncSettings,
    ) -> SyncResult<Self> {
        let def = validate_new_job(name, src_spec, dest_spec, &progress_store)?;
        Ok(Self::with_progress(def, src, dest, Some(JobProgress::new()), progress_store, settings))
    }

    /// Rebuild a job from its persisted definition.
    ///
    /// A job without a progress record starts from scratch; otherwise the
    /// record is loaded on the first tick.
    pub fn resume(
        data: &str,
        src: C,
        dest: C,
        progress_store: ProgressStore,
        settings: SyncSettings,
    ) -> SyncResult<Self> {
        let def = JobDefinition::from_json(data)?;
        let progress = if progress_store.progress_exists(&def.name)? {
            None
        } else {
            Some(JobProgress::new())
        };
        Ok(Self::with_progress(def, src, dest, progress, progress_store, settings))
    }

    fn with_progress(
        def: JobDefinition,
        src: C,
        dest: C,
        progress: Option<JobProgress>,
        progress_store: ProgressStore,
        settings: SyncSettings,
    ) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Idle);
        Self {
            def,
            src,
            dest,
            progress,
            progress_store,
            settings,
            lifecycle: Arc::new(lifecycle),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn definition(&self) -> &JobDefinition {
        &self.def
    }

    /// In-memory progress, if loaded.
    pub fn progress(&self) -> Option<&JobProgress> {
        self.progress.as_ref()
    }

    pub fn persist_health(&self) -> PersistHealth {
        self.progress_store.health()
    }

    /// One-time checks and id resolution for a new job.
    ///
    /// Requires binlog on the source, creates the destination database if
    /// needed, and refuses to overwrite an existing destination table.
    pub async fn first_run(&mut self) -> SyncResult<()> {
        let src_db = self.def.src.database.clone();
        if !self.src.database_exists().await? {
            return Err(SyncError::Preflight(format!("src database {} not exists", src_db)));
        }
        if self.def.sync_type == SyncType::Database && !self.src.database_binlog_enabled().await? {
            return Err(SyncError::Preflight(format!(
                "src database {} binlog not enabled",
                src_db
            )));
        }
        self.def.src.db_id = self.src.get_db_id().await?;

        if self.def.sync_type == SyncType::Table {
            let table = self.def.src.table.clone();
            if !self.src.table_exists(&table).await? {
                return Err(SyncError::Preflight(format!(
                    "src table {}.{} not exists",
                    src_db, table
                )));
            }
            if !self.src.table_binlog_enabled(&table).await? {
                return Err(SyncError::Preflight(format!(
                    "src table {}.{} binlog not enabled",
                    src_db, table
                )));
            }
            self.def.src.table_id = self.src.get_table_id(&table).await?;
        }

        if !self.dest.database_exists().await? {
            info!(job = %self.def.name, database = %self.def.dest.database, "Creating dest database");
            self.dest.create_database().await?;
        }
        self.def.dest.db_id = self.dest.get_db_id().await?;

        if self.def.sync_type == SyncType::Table
            && self.dest.table_exists(&self.def.dest.table).await?
        {
            return Err(SyncError::Preflight(format!(
                "dest table {} already exists",
                self.def.dest.qualified_name()
            )));
        }

        info!(
            job = %self.def.name,
            src_db_id = self.def.src.db_id,
            src_table_id = self.def.src.table_id,
            dest_db_id = self.def.dest.db_id,
            "First run checks passed"
        );
        Ok(())
    }

    /// Run one sync step.
    pub async fn sync(&mut self) -> SyncResult<()> {
        match self.def.sync_type {
            SyncType::Table => self.table_sync().await,
            SyncType::Database => {
                debug!(job = %self.def.name, "Database sync is not supported yet, skipping");
                Ok(())
            }
        }
    }

    async fn table_sync(&mut self) -> SyncResult<()> {
        let mut progress = match self.progress.take() {
            Some(progress) => progress,
            None => self.recover_progress()?,
        };

        let result = if progress.is_first_sync() {
            self.table_full_sync(&mut progress).await
        } else {
            self.table_incremental_sync(&mut progress).await
        };

        self.progress = Some(progress);
        result
    }

    fn recover_progress(&self) -> SyncResult<JobProgress> {
        match self.progress_store.load(&self.def.name)? {
            Some(progress) => {
                info!(
                    job = %self.def.name,
                    phase = ?progress.phase,
                    commit_seq = progress.commit_seq,
                    "Recovered progress"
                );
                Ok(progress)
            }
            None => {
                warn!(job = %self.def.name, "Progress record disappeared, starting over");
                Ok(JobProgress::new())
            }
        }
    }

    pub(crate) async fn persist(&self, progress: &JobProgress) -> SyncResult<()> {
        self.progress_store.save(&self.def.name, progress).await
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            lifecycle: self.lifecycle.clone(),
        }
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Tick every `sync_interval` until stopped. Sync errors are logged and
    /// the next tick retries.
    ///
    /// Only an idle job starts; the first tick fires one interval after start.
    pub async fn run(&mut self) {
        let started = self.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Idle {
                *state = Lifecycle::Running;
                true
            } else {
                false
            }
        });
        if !started {
            warn!(job = %self.def.name, state = ?self.lifecycle(), "Job is not idle, not starting");
            return;
        }

        let mut stop_rx = self.lifecycle.subscribe();
        let period = self.settings.sync_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(job = %self.def.name, interval_ms = period.as_millis() as u64, "Job started");

        loop {
            if *stop_rx.borrow_and_update() != Lifecycle::Running {
                break;
            }

            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    match self.sync().await {
                        Ok(()) => {}
                        Err(e) if e.is_retryable() => {
                            warn!(job = %self.def.name, error = %e, "Sync failed, retrying next tick");
                        }
                        Err(e) => error!(job = %self.def.name, error = %e, "Sync failed"),
                    }
                }
            }
        }

        self.lifecycle.send_replace(Lifecycle::Stopped);
        info!(job = %self.def.name, "Job stopped");
    }
}
