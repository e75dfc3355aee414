use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ccr_core::{Backend, Binlog, TabletCommitInfo, TabletMeta};

use crate::client::{BackendClient, Cluster, FrontendClient, MetadataProvider, SqlGateway};
use crate::error::{RpcError, RpcResult};
use crate::types::{
    BeginTxnResponse, IngestBinlogRequest, IngestBinlogResponse, SnapshotResponse, Status,
    StatusCode,
};

const FINISHED: &str = "FINISHED";

/// A table in a [`MockCluster`] catalog.
#[derive(Debug, Clone)]
pub struct MockTable {
    pub name: String,
    pub id: i64,
    pub binlog_enabled: bool,
    partitions: Vec<MockPartition>,
}

#[derive(Debug, Clone)]
struct MockPartition {
    id: i64,
    name: String,
    tablets: Vec<TabletMeta>,
}

impl MockTable {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
            binlog_enabled: true,
            partitions: vec![],
        }
    }

    pub fn binlog_enabled(mut self, enabled: bool) -> Self {
        self.binlog_enabled = enabled;
        self
    }

    pub fn partition(mut self, id: i64, name: impl Into<String>, tablets: Vec<TabletMeta>) -> Self {
        self.partitions.push(MockPartition {
            id,
            name: name.into(),
            tablets,
        });
        self
    }

    fn find_partition(&self, id: i64) -> RpcResult<&MockPartition> {
        self.partitions
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| RpcError::not_found(format!("partition {} of {}", id, self.name)))
    }
}

#[derive(Default)]
struct MockState {
    database_exists: bool,
    database_binlog_enabled: bool,
    db_id: i64,
    tables: BTreeMap<String, MockTable>,
    /// Tables that appear once a restore is submitted.
    restorable_tables: Vec<MockTable>,
    backends: BTreeMap<i64, Backend>,
    token: String,

    snapshot_commit_seq: i64,
    omit_job_info: bool,
    snapshots: HashMap<String, SnapshotResponse>,
    snapshot_requests: Vec<String>,
    backup_state: Option<String>,
    restore_state: Option<String>,
    backup_polls: usize,
    restore_polls: usize,
    restores: Vec<(String, SnapshotResponse)>,

    binlogs: Vec<Binlog>,
    next_txn_id: i64,
    txn_labels: HashMap<String, i64>,
    begun_txns: Vec<(String, i64)>,
    committed_txns: Vec<(i64, Vec<TabletCommitInfo>)>,
    executed_sql: Vec<String>,

    ingests: Vec<(i64, IngestBinlogRequest)>,
    failing_tablets: HashSet<i64>,
    ingest_delay: Duration,
    in_flight_ingests: usize,
    max_in_flight_ingests: usize,

    /// If set, all operations will fail with this error.
    fail_with: Option<String>,
}

impl MockState {
    fn table(&self, name: &str) -> RpcResult<&MockTable> {
        self.tables
            .get(name)
            .ok_or_else(|| RpcError::not_found(format!("table {}", name)))
    }
}

/// An in-memory cluster for testing.
#[derive(Clone)]
pub struct MockCluster {
    state: Arc<Mutex<MockState>>,
}

impl MockCluster {
    /// A cluster whose bound database exists with the given id.
    pub fn new(db_id: i64) -> Self {
        let state = MockState {
            database_exists: true,
            database_binlog_enabled: true,
            db_id,
            token: "mock-token".into(),
            next_txn_id: 1000,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A cluster whose bound database has not been created yet.
    pub fn without_database(db_id: i64) -> Self {
        let cluster = Self::new(db_id);
        cluster.state().database_exists = false;
        cluster
    }

    pub fn with_backend(self, id: i64, host: impl Into<String>) -> Self {
        let backend = Backend {
            id,
            host: host.into(),
            heartbeat_port: 9050,
            be_port: 9060,
            http_port: 8040,
            brpc_port: 8060,
        };
        self.state().backends.insert(id, backend);
        self
    }

    pub fn with_table(self, table: MockTable) -> Self {
        self.state().tables.insert(table.name.clone(), table);
        self
    }

    pub fn with_database_binlog(self, enabled: bool) -> Self {
        self.state().database_binlog_enabled = enabled;
        self
    }

    /// Make `table` appear in the catalog when a restore is submitted.
    pub fn stage_restore_table(&self, table: MockTable) {
        self.state().restorable_tables.push(table);
    }

    pub fn push_binlog(&self, binlog: Binlog) {
        self.state().binlogs.push(binlog);
    }

    pub fn set_snapshot_commit_seq(&self, commit_seq: i64) {
        self.state().snapshot_commit_seq = commit_seq;
    }

    /// Create snapshots without a job-info blob.
    pub fn omit_job_info(&self) {
        self.state().omit_job_info = true;
    }

    /// Override the state reported by `SHOW BACKUP` (default `FINISHED`).
    pub fn set_backup_state(&self, state: impl Into<String>) {
        self.state().backup_state = Some(state.into());
    }

    /// Override the state reported by `SHOW RESTORE` (default `FINISHED`).
    pub fn set_restore_state(&self, state: impl Into<String>) {
        self.state().restore_state = Some(state.into());
    }

    /// Make ingests into this local tablet report a failed status.
    pub fn fail_tablet(&self, tablet_id: i64) {
        self.state().failing_tablets.insert(tablet_id);
    }

    pub fn set_ingest_delay(&self, delay: Duration) {
        self.state().ingest_delay = delay;
    }

    /// Fail every operation with a transport error.
    pub fn fail_all(&self, message: impl Into<String>) {
        self.state().fail_with = Some(message.into());
    }

    pub fn recover(&self) {
        self.state().fail_with = None;
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.state().tables.contains_key(name)
    }

    pub fn database_exists_now(&self) -> bool {
        self.state().database_exists
    }

    pub fn snapshot_requests(&self) -> Vec<String> {
        self.state().snapshot_requests.clone()
    }

    pub fn restores(&self) -> Vec<(String, SnapshotResponse)> {
        self.state().restores.clone()
    }

    pub fn backup_polls(&self) -> usize {
        self.state().backup_polls
    }

    pub fn restore_polls(&self) -> usize {
        self.state().restore_polls
    }

    /// Every begin-transaction call as (label, txn id).
    pub fn begun_txns(&self) -> Vec<(String, i64)> {
        self.state().begun_txns.clone()
    }

    pub fn committed_txns(&self) -> Vec<(i64, Vec<TabletCommitInfo>)> {
        self.state().committed_txns.clone()
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.state().executed_sql.clone()
    }

    /// Every ingest received by this cluster's backends as (backend id, request).
    pub fn ingests(&self) -> Vec<(i64, IngestBinlogRequest)> {
        self.state().ingests.clone()
    }

    pub fn max_in_flight_ingests(&self) -> usize {
        self.state().max_in_flight_ingests
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call<T>(&self, f: impl FnOnce(&mut MockState) -> RpcResult<T>) -> RpcResult<T> {
        let mut state = self.state();
        if let Some(ref error) = state.fail_with {
            return Err(RpcError::Transport(error.clone()));
        }
        f(&mut state)
    }
}

impl MetadataProvider for MockCluster {
    fn get_db_id(&self) -> impl Future<Output = RpcResult<i64>> + Send {
        let result = self.call(|s| {
            if s.database_exists {
                Ok(s.db_id)
            } else {
                Err(RpcError::not_found("database"))
            }
        });
        async move { result }
    }

    fn get_table_id(&self, table: &str) -> impl Future<Output = RpcResult<i64>> + Send {
        let result = self.call(|s| s.table(table).map(|t| t.id));
        async move { result }
    }

    fn get_table_name(&self, table_id: i64) -> impl Future<Output = RpcResult<String>> + Send {
        let result = self.call(|s| {
            s.tables
                .values()
                .find(|t| t.id == table_id)
                .map(|t| t.name.clone())
                .ok_or_else(|| RpcError::not_found(format!("table id {}", table_id)))
        });
        async move { result }
    }

    fn get_partition_id(
        &self,
        table: &str,
        partition_name: &str,
    ) -> impl Future<Output = RpcResult<i64>> + Send {
        let result = self.call(|s| {
            let t = s.table(table)?;
            t.partitions
                .iter()
                .find(|p| p.name == partition_name)
                .map(|p| p.id)
                .ok_or_else(|| {
                    RpcError::not_found(format!("partition {} of {}", partition_name, table))
                })
        });
        async move { result }
    }

    fn get_partition_name(
        &self,
        table: &str,
        partition_id: i64,
    ) -> impl Future<Output = RpcResult<String>> + Send {
        let result = self.call(|s| {
            let t = s.table(table)?;
            t.find_partition(partition_id).map(|p| p.name.clone())
        });
        async move { result }
    }

    fn get_tablets(
        &self,
        table: &str,
        partition_id: i64,
    ) -> impl Future<Output = RpcResult<Vec<TabletMeta>>> + Send {
        let result = self.call(|s| {
            let t = s.table(table)?;
            t.find_partition(partition_id).map(|p| p.tablets.clone())
        });
        async move { result }
    }

    fn get_backends(&self) -> impl Future<Output = RpcResult<BTreeMap<i64, Backend>>> + Send {
        let result = self.call(|s| Ok(s.backends.clone()));
        async move { result }
    }

    fn get_master_token(&self) -> impl Future<Output = RpcResult<String>> + Send {
        let result = self.call(|s| Ok(s.token.clone()));
        async move { result }
    }

    fn exec(&self, sql: &str) -> impl Future<Output = RpcResult<()>> + Send {
        let result = self.call(|s| {
            s.executed_sql.push(sql.to_string());
            Ok(())
        });
        async move { result }
    }
}

impl SqlGateway for MockCluster {
    fn database_exists(&self) -> impl Future<Output = RpcResult<bool>> + Send {
        let result = self.call(|s| Ok(s.database_exists));
        async move { result }
    }

    fn table_exists(&self, table: &str) -> impl Future<Output = RpcResult<bool>> + Send {
        let result = self.call(|s| Ok(s.tables.contains_key(table)));
        async move { result }
    }

    fn create_database(&self) -> impl Future<Output = RpcResult<()>> + Send {
        let result = self.call(|s| {
            s.database_exists = true;
            Ok(())
        });
        async move { result }
    }

    fn database_binlog_enabled(&self) -> impl Future<Output = RpcResult<bool>> + Send {
        let result = self.call(|s| Ok(s.database_binlog_enabled));
        async move { result }
    }

    fn table_binlog_enabled(&self, table: &str) -> impl Future<Output = RpcResult<bool>> + Send {
        let result = self.call(|s| s.table(table).map(|t| t.binlog_enabled));
        async move { result }
    }

    fn backup_state(
        &self,
        snapshot_name: &str,
    ) -> impl Future<Output = RpcResult<Option<String>>> + Send {
        let result = self.call(|s| {
            s.backup_polls += 1;
            if !s.snapshots.contains_key(snapshot_name) {
                return Ok(None);
            }
            Ok(Some(
                s.backup_state.clone().unwrap_or_else(|| FINISHED.into()),
            ))
        });
        async move { result }
    }

    fn restore_state(&self, label: &str) -> impl Future<Output = RpcResult<Option<String>>> + Send {
        let result = self.call(|s| {
            s.restore_polls += 1;
            if !s.restores.iter().any(|(l, _)| l == label) {
                return Ok(None);
            }
            Ok(Some(
                s.restore_state.clone().unwrap_or_else(|| FINISHED.into()),
            ))
        });
        async move { result }
    }
}

impl FrontendClient for MockCluster {
    fn create_snapshot(
        &self,
        snapshot_name: &str,
        table: &str,
    ) -> impl Future<Output = RpcResult<()>> + Send {
        let result = self.call(|s| {
            let table_id = s.table(table)?.id;
            let job_info = if s.omit_job_info {
                None
            } else {
                let mut commit_seqs = serde_json::Map::new();
                commit_seqs.insert(table_id.to_string(), s.snapshot_commit_seq.into());
                let info = serde_json::json!({
                    "name": snapshot_name,
                    "table_commit_seq_map": commit_seqs,
                });
                Some(serde_json::to_vec(&info)?)
            };

            s.snapshot_requests.push(snapshot_name.to_string());
            s.snapshots.insert(
                snapshot_name.to_string(),
                SnapshotResponse {
                    meta: snapshot_name.as_bytes().to_vec(),
                    job_info,
                },
            );
            Ok(())
        });
        async move { result }
    }

    fn get_snapshot(
        &self,
        snapshot_name: &str,
    ) -> impl Future<Output = RpcResult<SnapshotResponse>> + Send {
        let result = self.call(|s| {
            s.snapshots
                .get(snapshot_name)
                .cloned()
                .ok_or_else(|| RpcError::not_found(format!("snapshot {}", snapshot_name)))
        });
        async move { result }
    }

    fn get_binlog(
        &self,
        _table: &str,
        prev_commit_seq: i64,
    ) -> impl Future<Output = RpcResult<Vec<Binlog>>> + Send {
        let result = self.call(|s| {
            Ok(s.binlogs
                .iter()
                .filter(|b| b.commit_seq > prev_commit_seq)
                .cloned()
                .collect())
        });
        async move { result }
    }

    fn begin_transaction(
        &self,
        _table: &str,
        label: &str,
    ) -> impl Future<Output = RpcResult<BeginTxnResponse>> + Send {
        let result = self.call(|s| {
            let txn_id = match s.txn_labels.get(label) {
                Some(id) => *id,
                None => {
                    let id = s.next_txn_id;
                    s.next_txn_id += 1;
                    s.txn_labels.insert(label.to_string(), id);
                    id
                }
            };
            s.begun_txns.push((label.to_string(), txn_id));
            Ok(BeginTxnResponse {
                txn_id,
                db_id: s.db_id,
            })
        });
        async move { result }
    }

    fn commit_transaction(
        &self,
        txn_id: i64,
        commit_infos: &[TabletCommitInfo],
    ) -> impl Future<Output = RpcResult<()>> + Send {
        let result = self.call(|s| {
            s.committed_txns.push((txn_id, commit_infos.to_vec()));
            Ok(())
        });
        async move { result }
    }

    fn restore_snapshot(
        &self,
        label: &str,
        _snapshot_name: &str,
        snapshot: &SnapshotResponse,
    ) -> impl Future<Output = RpcResult<()>> + Send {
        let result = self.call(|s| {
            s.restores.push((label.to_string(), snapshot.clone()));
            for table in std::mem::take(&mut s.restorable_tables) {
                s.tables.insert(table.name.clone(), table);
            }
            Ok(())
        });
        async move { result }
    }
}

impl Cluster for MockCluster {
    type Backend = MockBackend;

    fn backend_client(&self, backend: &Backend) -> RpcResult<MockBackend> {
        Ok(MockBackend {
            backend_id: backend.id,
            state: self.state.clone(),
        })
    }
}

/// Backend client handed out by [`MockCluster`]; records ingests on the cluster.
pub struct MockBackend {
    backend_id: i64,
    state: Arc<Mutex<MockState>>,
}

impl BackendClient for MockBackend {
    fn ingest_binlog(
        &self,
        request: IngestBinlogRequest,
    ) -> impl Future<Output = RpcResult<IngestBinlogResponse>> + Send {
        let state = self.state.clone();
        let backend_id = self.backend_id;

        async move {
            let delay = {
                let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(ref error) = s.fail_with {
                    return Err(RpcError::Transport(error.clone()));
                }
                s.in_flight_ingests += 1;
                s.max_in_flight_ingests = s.max_in_flight_ingests.max(s.in_flight_ingests);
                s.ingest_delay
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
            s.in_flight_ingests -= 1;
            let failed = s.failing_tablets.contains(&request.local_tablet_id);
            let tablet_id = request.local_tablet_id;
            s.ingests.push((backend_id, request));

            let status = if failed {
                Status::error(
                    StatusCode::InternalError,
                    format!("ingest of tablet {} failed", tablet_id),
                )
            } else {
                Status::ok()
            };
            Ok(IngestBinlogResponse {
                status: Some(status),
            })
        }
    }
}
