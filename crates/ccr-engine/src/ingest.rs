//! Fan-out of one upsert's tablet versions to the destination backends.
//!
//! Every destination replica of every tablet in every changed partition pulls
//! its data from the first replica of the matching source tablet. Tasks are
//! planned up front, so a topology problem fails the upsert before any ingest
//! RPC is sent, then dispatched with bounded concurrency.

use std::sync::Arc;

use ccr_core::{Spec, TabletCommitInfo, Upsert};
use ccr_rpc::{BackendClient, Cluster, IngestBinlogRequest, RpcError, UniqueId};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Sentinel load id sent with every ingest request.
const LOAD_ID: UniqueId = UniqueId { hi: -1, lo: -1 };

/// One ingest RPC and the receipt it produces on success.
struct IngestTask<B> {
    client: B,
    request: IngestBinlogRequest,
    receipt: TabletCommitInfo,
}

/// Plans and runs the ingest RPCs for one upsert inside an open transaction.
pub struct IngestionCoordinator<'a, C: Cluster> {
    src: &'a C,
    dest: &'a C,
    src_spec: &'a Spec,
    dest_spec: &'a Spec,
    concurrency: usize,
}

impl<'a, C: Cluster> IngestionCoordinator<'a, C> {
    pub fn new(
        src: &'a C,
        dest: &'a C,
        src_spec: &'a Spec,
        dest_spec: &'a Spec,
        concurrency: usize,
    ) -> Self {
        Self {
            src,
            dest,
            src_spec,
            dest_spec,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingest every changed tablet of `upsert` under `txn_id`.
    ///
    /// Returns one receipt per destination replica. On failure no further
    /// RPCs are started, the ones already running are awaited, and the first
    /// error is returned.
    pub async fn ingest(&self, txn_id: i64, upsert: &Upsert) -> SyncResult<Vec<TabletCommitInfo>> {
        let tasks = self.plan(txn_id, upsert).await?;
        info!(
            txn_id,
            commit_seq = upsert.commit_seq,
            tasks = tasks.len(),
            "Ingesting binlog"
        );
        self.dispatch(tasks).await
    }

    async fn plan(&self, txn_id: i64, upsert: &Upsert) -> SyncResult<Vec<IngestTask<C::Backend>>> {
        let src_table_id = if self.src_spec.table_id != 0 {
            self.src_spec.table_id
        } else {
            self.src.get_table_id(&self.src_spec.table).await?
        };

        let table_record = upsert.table_records.get(&src_table_id).ok_or_else(|| {
            SyncError::Protocol(format!(
                "upsert {} has no record for table {}",
                upsert.commit_seq, src_table_id
            ))
        })?;

        let src_backends = self.src.get_backends().await?;
        let dest_backends = self.dest.get_backends().await?;

        let mut tasks = Vec::new();
        for partition in &table_record.partition_records {
            let partition_name = self
                .src
                .get_partition_name(&self.src_spec.table, partition.partition_id)
                .await?;

            let dest_partition_id = self
                .dest
                .get_partition_id(&self.dest_spec.table, &partition_name)
                .await
                .map_err(|e| partition_error(e, self.dest_spec, &partition_name))?;

            let src_tablets = self
                .src
                .get_tablets(&self.src_spec.table, partition.partition_id)
                .await?;
            let dest_tablets = self
                .dest
                .get_tablets(&self.dest_spec.table, dest_partition_id)
                .await?;

            if src_tablets.len() != dest_tablets.len() {
                return Err(SyncError::TopologyMismatch(format!(
                    "partition {}: src has {} tablets, dest has {}",
                    partition_name,
                    src_tablets.len(),
                    dest_tablets.len()
                )));
            }

            // Tablets are matched by position in catalog order.
            for (src_tablet, dest_tablet) in src_tablets.iter().zip(&dest_tablets) {
                let src_replica = src_tablet.first_replica().ok_or_else(|| {
                    SyncError::TopologyMismatch(format!("src tablet {} has no replicas", src_tablet.id))
                })?;
                let src_backend = src_backends.get(&src_replica.backend_id).ok_or_else(|| {
                    SyncError::TopologyMismatch(format!(
                        "src backend {} of tablet {} not found",
                        src_replica.backend_id, src_tablet.id
                    ))
                })?;

                for dest_replica in dest_tablet.replicas.values() {
                    let dest_backend = dest_backends.get(&dest_replica.backend_id).ok_or_else(|| {
                        SyncError::TopologyMismatch(format!(
                            "dest backend {} of tablet {} not found",
                            dest_replica.backend_id, dest_tablet.id
                        ))
                    })?;

                    tasks.push(IngestTask {
                        client: self.dest.backend_client(dest_backend)?,
                        request: IngestBinlogRequest {
                            txn_id,
                            remote_tablet_id: src_tablet.id,
                            binlog_version: partition.version,
                            remote_host: src_backend.host.clone(),
                            remote_port: src_backend.http_port_str(),
                            partition_id: dest_partition_id,
                            local_tablet_id: dest_replica.tablet_id,
                            load_id: LOAD_ID,
                        },
                        receipt: TabletCommitInfo {
                            tablet_id: dest_replica.tablet_id,
                            backend_id: dest_backend.id,
                        },
                    });
                }
            }
        }

        Ok(tasks)
    }

    async fn dispatch(&self, tasks: Vec<IngestTask<C::Backend>>) -> SyncResult<Vec<TabletCommitInfo>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        let mut receipts = Vec::with_capacity(tasks.len());
        let mut first_error: Option<SyncError> = None;

        for task in tasks {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            while let Some(joined) = join_set.try_join_next() {
                collect(joined, &mut receipts, &mut first_error);
            }
            if first_error.is_some() {
                break;
            }

            join_set.spawn(async move {
                let _permit = permit;
                run_task(task).await
            });
        }

        while let Some(joined) = join_set.join_next().await {
            collect(joined, &mut receipts, &mut first_error);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(receipts),
        }
    }
}

fn partition_error(e: RpcError, dest: &Spec, partition_name: &str) -> SyncError {
    if e.is_not_found() {
        SyncError::PartitionNotFound(format!(
            "{} has no partition {}",
            dest.qualified_name(),
            partition_name
        ))
    } else {
        e.into()
    }
}

async fn run_task<B: BackendClient>(task: IngestTask<B>) -> SyncResult<TabletCommitInfo> {
    let tablet_id = task.receipt.tablet_id;
    debug!(
        tablet_id,
        backend_id = task.receipt.backend_id,
        remote_tablet_id = task.request.remote_tablet_id,
        version = task.request.binlog_version,
        "Sending ingest request"
    );

    let response = task.client.ingest_binlog(task.request).await?;
    let status = response.status.ok_or_else(|| {
        SyncError::Protocol(format!("ingest response for tablet {} has no status", tablet_id))
    })?;

    if !status.is_ok() {
        return Err(SyncError::Ingest(format!(
            "tablet {} on backend {}: {:?} {}",
            tablet_id,
            task.receipt.backend_id,
            status.code,
            status.error_msgs.join("; ")
        )));
    }

    Ok(task.receipt)
}

fn collect(
    joined: Result<SyncResult<TabletCommitInfo>, JoinError>,
    receipts: &mut Vec<TabletCommitInfo>,
    first_error: &mut Option<SyncError>,
) {
    let error = match joined {
        Ok(Ok(receipt)) => {
            receipts.push(receipt);
            return;
        }
        Ok(Err(e)) => e,
        Err(e) => SyncError::Ingest(format!("ingest task aborted: {}", e)),
    };

    if first_error.is_none() {
        warn!(error = %error, "Ingest failed, stopping dispatch");
        *first_error = Some(error);
    } else {
        debug!(error = %error, "Additional ingest failure");
    }
}
