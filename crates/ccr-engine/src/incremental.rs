//! Replay of the source binlog, one entry per tick.

use ccr_core::{txn_label, AddPartition, Binlog, BinlogType, JobProgress, SyncType, Upsert};
use ccr_rpc::Cluster;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::ingest::IngestionCoordinator;
use crate::job::Job;

impl<C: Cluster> Job<C> {
    pub(crate) async fn table_incremental_sync(&mut self, progress: &mut JobProgress) -> SyncResult<()> {
        let prev_commit_seq = progress.commit_seq;
        let binlogs = self.src.get_binlog(&self.def.src.table, prev_commit_seq).await?;

        let Some(binlog) = binlogs.into_iter().next() else {
            debug!(job = %self.def.name, commit_seq = prev_commit_seq, "No new binlog");
            return Ok(());
        };

        if binlog.commit_seq <= prev_commit_seq {
            warn!(
                job = %self.def.name,
                commit_seq = binlog.commit_seq,
                prev_commit_seq,
                "Skipping already applied binlog"
            );
            return Ok(());
        }

        self.apply_binlog(progress, &binlog).await?;

        progress.done_binlog(binlog.commit_seq);
        self.persist(progress).await
    }

    async fn apply_binlog(&mut self, progress: &mut JobProgress, binlog: &Binlog) -> SyncResult<()> {
        let kind = binlog.kind()?;
        debug!(
            job = %self.def.name,
            binlog_type = %kind,
            commit_seq = binlog.commit_seq,
            "Applying binlog"
        );

        match kind {
            BinlogType::Upsert => self.apply_upsert(progress, binlog).await,
            BinlogType::AddPartition => self.apply_add_partition(binlog).await,
            _ => {
                debug!(job = %self.def.name, binlog_type = %kind, "Binlog type not replicated");
                Ok(())
            }
        }
    }

    async fn apply_upsert(&mut self, progress: &mut JobProgress, binlog: &Binlog) -> SyncResult<()> {
        let upsert = Upsert::from_json(&binlog.data)?;
        let label = txn_label(&self.def.dest, upsert.commit_seq);

        let txn = self.dest.begin_transaction(&self.def.dest.table, &label).await?;
        info!(
            job = %self.def.name,
            txn_id = txn.txn_id,
            label = %label,
            "Began transaction"
        );
        progress.begin_txn(txn.txn_id, upsert.commit_seq);
        self.persist(progress).await?;

        let coordinator = IngestionCoordinator::new(
            &self.src,
            &self.dest,
            &self.def.src,
            &self.def.dest,
            self.settings.ingest_concurrency,
        );
        let commit_infos = match coordinator.ingest(txn.txn_id, &upsert).await {
            Ok(infos) => infos,
            Err(e) => {
                // The label is reused next tick, which rebinds to this transaction.
                warn!(job = %self.def.name, txn_id = txn.txn_id, "Transaction left open after ingest failure");
                return Err(e);
            }
        };

        self.dest.commit_transaction(txn.txn_id, &commit_infos).await?;
        info!(
            job = %self.def.name,
            txn_id = txn.txn_id,
            commit_seq = upsert.commit_seq,
            tablets = commit_infos.len(),
            "Committed transaction"
        );
        Ok(())
    }

    async fn apply_add_partition(&mut self, binlog: &Binlog) -> SyncResult<()> {
        let record = AddPartition::from_json(&binlog.data)?;

        let table = match self.def.sync_type {
            SyncType::Table => self.def.dest.table.clone(),
            SyncType::Database => self.dest.get_table_name(record.table_id).await?,
        };

        let sql = format!("ALTER TABLE {}.{} {}", self.def.dest.database, table, record.sql);
        info!(job = %self.def.name, sql = %sql, "Adding partition");
        self.dest.exec(&sql).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ccr_core::{Spec, SyncSettings};
    use ccr_rpc::{MockCluster, MockTable};
    use ccr_state::SqliteJobStore;

    use crate::progress::ProgressStore;

    fn spec(database: &str, table: &str) -> Spec {
        Spec {
            host: "fe".into(),
            port: 9030,
            thrift_port: 9020,
            user: "root".into(),
            database: database.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    fn job(src_spec: Spec, dest_spec: Spec, src: MockCluster, dest: MockCluster) -> Job<MockCluster> {
        let store = ProgressStore::new(
            Arc::new(SqliteJobStore::in_memory().unwrap()),
            &SyncSettings::default(),
        );
        Job::create("j1", src_spec, dest_spec, src, dest, store, SyncSettings::default()).unwrap()
    }

    fn add_partition(table_id: i64) -> Binlog {
        Binlog::new(
            BinlogType::AddPartition,
            5,
            format!(
                r#"{{"dbId": 1, "tableId": {}, "sql": "ADD PARTITION p202402 VALUES LESS THAN ('2024-03-01')"}}"#,
                table_id
            ),
        )
    }

    #[tokio::test]
    async fn test_add_partition_on_database_job_uses_dest_table_name() {
        let src = MockCluster::new(1).with_table(MockTable::new("src_events", 42));
        let dest = MockCluster::new(2).with_table(MockTable::new("events", 42));
        let mut job = job(spec("src_db", ""), spec("dest_db", ""), src, dest.clone());

        job.apply_add_partition(&add_partition(42)).await.unwrap();

        assert_eq!(
            dest.executed_sql(),
            vec!["ALTER TABLE dest_db.events ADD PARTITION p202402 VALUES LESS THAN ('2024-03-01')".to_string()]
        );
    }

    #[tokio::test]
    async fn test_add_partition_on_table_job_uses_dest_table() {
        let src = MockCluster::new(1).with_table(MockTable::new("orders", 42));
        let dest = MockCluster::new(2);
        let mut job = job(spec("src_db", "orders"), spec("dest_db", "orders_copy"), src, dest.clone());

        job.apply_add_partition(&add_partition(42)).await.unwrap();

        assert_eq!(
            dest.executed_sql(),
            vec!["ALTER TABLE dest_db.orders_copy ADD PARTITION p202402 VALUES LESS THAN ('2024-03-01')".to_string()]
        );
    }

    #[tokio::test]
    async fn test_untouched_types_advance_commit_seq() {
        let src = MockCluster::new(1).with_table(MockTable::new("orders", 42));
        src.push_binlog(Binlog::new(BinlogType::Barrier, 11, "{}"));
        let dest = MockCluster::new(2);
        let mut job = job(spec("src_db", "orders"), spec("dest_db", "orders"), src, dest.clone());

        let mut progress = JobProgress::new();
        progress.done_full_sync(10);
        job.table_incremental_sync(&mut progress).await.unwrap();

        assert_eq!(progress.commit_seq, 11);
        assert!(dest.begun_txns().is_empty());
        assert!(dest.executed_sql().is_empty());
    }
}
