use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ccr_core::{JobDefinition, Spec, SyncSettings};
use ccr_rpc::Cluster;
use ccr_state::JobStore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::{SyncError, SyncResult};
use crate::job::{Job, StopHandle};
use crate::progress::ProgressStore;

/// Builds cluster clients from a spec.
pub trait ClusterFactory: Send + Sync {
    type Cluster: Cluster;

    fn connect(&self, spec: &Spec) -> SyncResult<Self::Cluster>;
}

struct RunningJob {
    stop: StopHandle,
    task: JoinHandle<()>,
}

/// Owns the run loops of every job in a Job Store.
pub struct Syncer<F: ClusterFactory> {
    factory: F,
    progress_store: ProgressStore,
    settings: SyncSettings,
    jobs: Mutex<HashMap<String, RunningJob>>,
}

impl<F: ClusterFactory> Syncer<F> {
    pub fn new(store: Arc<dyn JobStore>, factory: F, settings: SyncSettings) -> Self {
        Self {
            factory,
            progress_store: ProgressStore::new(store, &settings),
            settings,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Start every job registered in the store. Returns how many were started;
    /// jobs that fail to load are logged and skipped.
    ///
    /// A job that has never persisted progress was only registered, so it gets
    /// the same first-run checks as [`Syncer::add_job`] before it starts.
    pub async fn recover(&self) -> SyncResult<usize> {
        let jobs = self.progress_store.store().list_jobs()?;
        let mut started = 0;

        for (name, data) in jobs {
            match self.resume_job(&data).await {
                Ok(job) => {
                    self.spawn(job);
                    started += 1;
                }
                Err(e) => error!(job = %name, error = %e, "Failed to resume job"),
            }
        }

        info!(jobs = started, "Recovered jobs");
        Ok(started)
    }

    async fn resume_job(&self, data: &str) -> SyncResult<Job<F::Cluster>> {
        let def = JobDefinition::from_json(data)?;
        let fresh = !self.progress_store.progress_exists(&def.name)?;
        let mut job = Job::resume(
            data,
            self.factory.connect(&def.src)?,
            self.factory.connect(&def.dest)?,
            self.progress_store.clone(),
            self.settings.clone(),
        )?;

        if fresh {
            info!(job = %def.name, "Job has no progress yet, running first-run checks");
            job.first_run().await?;
            self.progress_store.save_job(job.definition())?;
        }
        Ok(job)
    }

    /// Create, check and register a new job, then start it.
    pub async fn add_job(&self, name: &str, src: Spec, dest: Spec) -> SyncResult<()> {
        let src_cluster = self.factory.connect(&src)?;
        let dest_cluster = self.factory.connect(&dest)?;
        let mut job = Job::create(
            name,
            src,
            dest,
            src_cluster,
            dest_cluster,
            self.progress_store.clone(),
            self.settings.clone(),
        )?;

        job.first_run().await?;
        self.progress_store
            .store()
            .add_job(name, &job.definition().to_json()?)?;

        info!(job = name, "Added job");
        self.spawn(job);
        Ok(())
    }

    /// Stop a job, wait for its loop to exit, and delete it from the store.
    pub async fn remove_job(&self, name: &str) -> SyncResult<()> {
        let running = self.jobs().remove(name);
        if let Some(running) = running {
            running.stop.stop();
            if let Err(e) = running.task.await {
                error!(job = name, error = %e, "Job task failed");
            }
        }

        match self.progress_store.store().remove_job(name) {
            Err(ccr_state::StateError::NotFound(_)) => Err(SyncError::JobNotFound(name.to_string())),
            other => Ok(other?),
        }
    }

    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.jobs().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop all jobs and wait for their loops to exit.
    pub async fn shutdown(&self) {
        let running: Vec<_> = self.jobs().drain().collect();
        for (_, job) in &running {
            job.stop.stop();
        }
        for (name, job) in running {
            if let Err(e) = job.task.await {
                error!(job = %name, error = %e, "Job task failed");
            }
        }
        info!("All jobs stopped");
    }

    fn spawn(&self, mut job: Job<F::Cluster>) {
        let name = job.name().to_string();
        let stop = job.stop_handle();
        let task = tokio::spawn(async move { job.run().await });

        if let Some(previous) = self.jobs().insert(name, RunningJob { stop, task }) {
            previous.stop.stop();
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, RunningJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
