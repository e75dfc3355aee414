use std::collections::BTreeMap;
use std::future::Future;

use ccr_core::{Backend, Binlog, TabletCommitInfo, TabletMeta};

use crate::error::RpcResult;
use crate::types::{BeginTxnResponse, IngestBinlogRequest, IngestBinlogResponse, SnapshotResponse};

/// Catalog lookups for the database a cluster client is bound to.
///
/// Lookups of missing objects fail with [`RpcError::NotFound`](crate::RpcError::NotFound).
pub trait MetadataProvider: Send + Sync {
    fn get_db_id(&self) -> impl Future<Output = RpcResult<i64>> + Send;

    fn get_table_id(&self, table: &str) -> impl Future<Output = RpcResult<i64>> + Send;

    fn get_table_name(&self, table_id: i64) -> impl Future<Output = RpcResult<String>> + Send;

    fn get_partition_id(
        &self,
        table: &str,
        partition_name: &str,
    ) -> impl Future<Output = RpcResult<i64>> + Send;

    fn get_partition_name(
        &self,
        table: &str,
        partition_id: i64,
    ) -> impl Future<Output = RpcResult<String>> + Send;

    /// Tablets of a partition, in the catalog's native order.
    fn get_tablets(
        &self,
        table: &str,
        partition_id: i64,
    ) -> impl Future<Output = RpcResult<Vec<TabletMeta>>> + Send;

    /// Live backends, keyed by backend id.
    fn get_backends(&self) -> impl Future<Output = RpcResult<BTreeMap<i64, Backend>>> + Send;

    /// Token that lets another cluster's backends authenticate against this one.
    fn get_master_token(&self) -> impl Future<Output = RpcResult<String>> + Send;

    /// Execute a DDL statement.
    fn exec(&self, sql: &str) -> impl Future<Output = RpcResult<()>> + Send;
}

/// Queries against the cluster's SQL endpoint.
pub trait SqlGateway: Send + Sync {
    fn database_exists(&self) -> impl Future<Output = RpcResult<bool>> + Send;

    fn table_exists(&self, table: &str) -> impl Future<Output = RpcResult<bool>> + Send;

    /// `CREATE DATABASE IF NOT EXISTS` for the bound database.
    fn create_database(&self) -> impl Future<Output = RpcResult<()>> + Send;

    fn database_binlog_enabled(&self) -> impl Future<Output = RpcResult<bool>> + Send;

    fn table_binlog_enabled(&self, table: &str) -> impl Future<Output = RpcResult<bool>> + Send;

    /// State column of `SHOW BACKUP` for the snapshot, if a row exists.
    fn backup_state(
        &self,
        snapshot_name: &str,
    ) -> impl Future<Output = RpcResult<Option<String>>> + Send;

    /// State column of `SHOW RESTORE` for the label, if a row exists.
    fn restore_state(&self, label: &str) -> impl Future<Output = RpcResult<Option<String>>> + Send;
}

/// Frontend RPCs. Implementations do not retry.
pub trait FrontendClient: Send + Sync {
    /// Create a named snapshot of `table` and wait until it has been issued.
    fn create_snapshot(
        &self,
        snapshot_name: &str,
        table: &str,
    ) -> impl Future<Output = RpcResult<()>> + Send;

    fn get_snapshot(
        &self,
        snapshot_name: &str,
    ) -> impl Future<Output = RpcResult<SnapshotResponse>> + Send;

    /// Binlog entries after `prev_commit_seq` for `table`; empty when nothing is new.
    fn get_binlog(
        &self,
        table: &str,
        prev_commit_seq: i64,
    ) -> impl Future<Output = RpcResult<Vec<Binlog>>> + Send;

    fn begin_transaction(
        &self,
        table: &str,
        label: &str,
    ) -> impl Future<Output = RpcResult<BeginTxnResponse>> + Send;

    fn commit_transaction(
        &self,
        txn_id: i64,
        commit_infos: &[TabletCommitInfo],
    ) -> impl Future<Output = RpcResult<()>> + Send;

    /// Restore a (possibly patched) snapshot under `label`.
    fn restore_snapshot(
        &self,
        label: &str,
        snapshot_name: &str,
        snapshot: &SnapshotResponse,
    ) -> impl Future<Output = RpcResult<()>> + Send;
}

/// RPCs to a single backend.
pub trait BackendClient: Send + Sync + 'static {
    fn ingest_binlog(
        &self,
        request: IngestBinlogRequest,
    ) -> impl Future<Output = RpcResult<IngestBinlogResponse>> + Send;
}

/// Everything the engine needs from one cluster, bound to one database.
pub trait Cluster: MetadataProvider + SqlGateway + FrontendClient + 'static {
    type Backend: BackendClient;

    /// Client for one of this cluster's backends.
    fn backend_client(&self, backend: &Backend) -> RpcResult<Self::Backend>;
}
