//! Snapshot on the source, restore on the destination.
//!
//! Each step persists its outcome before the next one starts, so a restarted
//! job picks up at the step it was in rather than taking a new snapshot.

use ccr_core::{
    extract_table_commit_seq_map, patch_job_info, restore_label, snapshot_label, ExtraInfo,
    FullSyncState, JobProgress, SnapshotKind,
};
use ccr_rpc::{Cluster, RpcResult, SnapshotResponse};
use chrono::Utc;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::job::Job;
use crate::poll::{poll_until, PollOutcome};

const FINISHED: &str = "FINISHED";
const CANCELLED: &str = "CANCELLED";

/// What the driver does after a step.
enum Step {
    Continue,
    /// Give up the tick; the persisted state says where the next one starts.
    Yield,
}

impl<C: Cluster> Job<C> {
    pub(crate) async fn table_full_sync(&mut self, progress: &mut JobProgress) -> SyncResult<()> {
        loop {
            let step = match progress.full_sync.clone() {
                FullSyncState::None | FullSyncState::Done => self.create_snapshot(progress).await?,
                FullSyncState::SnapshotInProgress { snapshot } => {
                    self.wait_backup(progress, snapshot).await?
                }
                FullSyncState::SnapshotDone { snapshot } => {
                    self.start_restore(progress, snapshot).await?
                }
                FullSyncState::RestoreInProgress {
                    snapshot,
                    restore_label,
                    commit_seq,
                } => {
                    self.wait_restore(progress, snapshot, restore_label, commit_seq)
                        .await?
                }
            };

            if let Step::Yield = step {
                return Ok(());
            }
        }
    }

    async fn create_snapshot(&mut self, progress: &mut JobProgress) -> SyncResult<Step> {
        progress.sync_id += 1;
        let snapshot = snapshot_label(SnapshotKind::Full, &self.def.name, progress.sync_id);
        progress.begin_create_snapshot(snapshot.clone());
        self.persist(progress).await?;

        info!(job = %self.def.name, snapshot = %snapshot, "Creating snapshot");
        if let Err(e) = self.src.create_snapshot(&snapshot, &self.def.src.table).await {
            progress.reset_full_sync();
            self.persist(progress).await?;
            return Err(e.into());
        }
        Ok(Step::Continue)
    }

    async fn wait_backup(&mut self, progress: &mut JobProgress, snapshot: String) -> SyncResult<Step> {
        let src = &self.src;
        let outcome = self
            .wait_finished("backup", &snapshot, |name| async move {
                src.backup_state(&name).await
            })
            .await?;

        match outcome {
            PollOutcome::Finished(_) => {
                info!(job = %self.def.name, snapshot = %snapshot, "Backup finished");
                progress.done_create_snapshot(snapshot);
                self.persist(progress).await?;
                Ok(Step::Continue)
            }
            PollOutcome::Exhausted(last) if is_lost(&last) => {
                warn!(
                    job = %self.def.name,
                    snapshot = %snapshot,
                    state = ?last.flatten(),
                    "Backup is gone, taking a new snapshot next tick"
                );
                progress.reset_full_sync();
                self.persist(progress).await?;
                Ok(Step::Yield)
            }
            PollOutcome::Exhausted(last) => {
                warn!(
                    job = %self.def.name,
                    snapshot = %snapshot,
                    state = ?last.flatten(),
                    "Backup not finished yet"
                );
                Ok(Step::Yield)
            }
        }
    }

    async fn start_restore(&mut self, progress: &mut JobProgress, snapshot: String) -> SyncResult<Step> {
        let response = self.src.get_snapshot(&snapshot).await?;
        let job_info = response
            .job_info
            .as_deref()
            .ok_or_else(|| SyncError::Protocol(format!("snapshot {} has no job info", snapshot)))?;

        let src_table_id = self.src_table_id().await?;
        let commit_seqs = extract_table_commit_seq_map(job_info)?;
        let commit_seq = *commit_seqs.get(&src_table_id).ok_or_else(|| {
            SyncError::Protocol(format!(
                "snapshot {} has no commit seq for table {}",
                snapshot, src_table_id
            ))
        })?;

        let token = self.src.get_master_token().await?;
        let backends = self.src.get_backends().await?;
        let extra = ExtraInfo::from_backends(backends.values(), token);
        let patched = patch_job_info(job_info, &extra)?;

        let response = SnapshotResponse {
            meta: response.meta,
            job_info: Some(patched),
        };

        let label = restore_label(&snapshot, Utc::now().timestamp());
        info!(
            job = %self.def.name,
            snapshot = %snapshot,
            restore_label = %label,
            commit_seq,
            "Restoring snapshot"
        );
        self.dest.restore_snapshot(&label, &snapshot, &response).await?;

        progress.begin_restore(snapshot, label, commit_seq);
        self.persist(progress).await?;
        Ok(Step::Continue)
    }

    async fn wait_restore(
        &mut self,
        progress: &mut JobProgress,
        snapshot: String,
        label: String,
        commit_seq: i64,
    ) -> SyncResult<Step> {
        let dest = &self.dest;
        let outcome = self
            .wait_finished("restore", &label, |name| async move {
                dest.restore_state(&name).await
            })
            .await?;

        match outcome {
            PollOutcome::Finished(_) => {}
            PollOutcome::Exhausted(last) if is_lost(&last) => {
                warn!(
                    job = %self.def.name,
                    restore_label = %label,
                    state = ?last.flatten(),
                    "Restore is gone, resubmitting next tick"
                );
                progress.done_create_snapshot(snapshot);
                self.persist(progress).await?;
                return Ok(Step::Yield);
            }
            PollOutcome::Exhausted(last) => {
                warn!(
                    job = %self.def.name,
                    restore_label = %label,
                    state = ?last.flatten(),
                    "Restore not finished yet"
                );
                return Ok(Step::Yield);
            }
        }

        // The restore created the destination table under a new id.
        let dest_table_id = self.dest.get_table_id(&self.def.dest.table).await?;
        self.def.dest.table_id = dest_table_id;
        self.progress_store.save_job(&self.def)?;

        progress.done_full_sync(commit_seq);
        self.persist(progress).await?;

        info!(
            job = %self.def.name,
            dest_table_id,
            commit_seq,
            "Full sync done"
        );
        Ok(Step::Yield)
    }

    async fn src_table_id(&mut self) -> SyncResult<i64> {
        if self.def.src.table_id == 0 {
            self.def.src.table_id = self.src.get_table_id(&self.def.src.table).await?;
        }
        Ok(self.def.src.table_id)
    }

    async fn wait_finished<F, Fut>(
        &self,
        what: &'static str,
        name: &str,
        fetch: F,
    ) -> SyncResult<PollOutcome<Option<String>>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = RpcResult<Option<String>>>,
    {
        let job = self.def.name.as_str();
        poll_until(
            self.settings.poll_max_retries,
            self.settings.poll_interval,
            |attempt| {
                let state = fetch(name.to_string());
                async move {
                    let state = state.await?;
                    debug!(job, what, name, attempt, state = ?state, "Checking state");
                    Ok::<_, SyncError>(state)
                }
            },
            |state| state.as_deref() == Some(FINISHED),
        )
        .await
    }
}

/// A job that has no row, or was cancelled, will never finish.
fn is_lost(last: &Option<Option<String>>) -> bool {
    match last {
        Some(None) => true,
        Some(Some(state)) => state == CANCELLED,
        None => false,
    }
}
