use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Nothing has been transferred yet.
    #[default]
    FirstSync,
    /// A snapshot/restore transfer is under way.
    FullSync,
    /// Steady state: binlog entries are applied one per tick.
    Incremental,
}

/// Per-cycle state of the progress record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// A cycle is in flight (e.g. a destination transaction is open).
    Doing,
    /// The last cycle completed.
    #[default]
    Done,
}

/// Sub-state of a full (snapshot + restore) sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FullSyncState {
    #[default]
    None,
    SnapshotInProgress {
        snapshot: String,
    },
    SnapshotDone {
        snapshot: String,
    },
    RestoreInProgress {
        snapshot: String,
        restore_label: String,
        commit_seq: i64,
    },
    Done,
}

/// A destination transaction that has been begun but not committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightTxn {
    pub txn_id: i64,
    pub commit_seq: i64,
}

/// The resumable state of one job.
///
/// Always written as a whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub phase: SyncPhase,
    pub job_state: JobState,
    /// Incremented for every full-sync attempt; part of the snapshot name.
    pub sync_id: i64,
    /// Last binlog commit sequence that was fully applied.
    pub commit_seq: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<InFlightTxn>,
    #[serde(default)]
    pub full_sync: FullSyncState,
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the full sync has completed.
    pub fn is_first_sync(&self) -> bool {
        self.phase != SyncPhase::Incremental
    }

    /// Record that `snapshot` has been requested from the source.
    pub fn begin_create_snapshot(&mut self, snapshot: impl Into<String>) {
        self.phase = SyncPhase::FullSync;
        self.job_state = JobState::Doing;
        self.full_sync = FullSyncState::SnapshotInProgress {
            snapshot: snapshot.into(),
        };
    }

    pub fn done_create_snapshot(&mut self, snapshot: impl Into<String>) {
        self.full_sync = FullSyncState::SnapshotDone {
            snapshot: snapshot.into(),
        };
    }

    pub fn begin_restore(
        &mut self,
        snapshot: impl Into<String>,
        restore_label: impl Into<String>,
        commit_seq: i64,
    ) {
        self.full_sync = FullSyncState::RestoreInProgress {
            snapshot: snapshot.into(),
            restore_label: restore_label.into(),
            commit_seq,
        };
    }

    /// Abandon the current snapshot so the next tick starts over.
    pub fn reset_full_sync(&mut self) {
        self.full_sync = FullSyncState::None;
    }

    /// Finish the full sync; incremental sync resumes after `commit_seq`.
    pub fn done_full_sync(&mut self, commit_seq: i64) {
        self.phase = SyncPhase::Incremental;
        self.job_state = JobState::Done;
        self.full_sync = FullSyncState::Done;
        self.commit_seq = commit_seq;
        self.transaction = None;
    }

    /// Record an open destination transaction for `commit_seq`.
    pub fn begin_txn(&mut self, txn_id: i64, commit_seq: i64) {
        self.job_state = JobState::Doing;
        self.transaction = Some(InFlightTxn { txn_id, commit_seq });
    }

    /// Mark the binlog at `commit_seq` as applied.
    ///
    /// The commit sequence never moves backwards.
    pub fn done_binlog(&mut self, commit_seq: i64) {
        self.job_state = JobState::Done;
        self.transaction = None;
        self.commit_seq = self.commit_seq.max(commit_seq);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}
