use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ccr_core::{JobDefinition, JobProgress, Spec, SyncPhase, SyncSettings, TabletMeta};
use ccr_engine::{ClusterFactory, SyncError, SyncResult, Syncer};
use ccr_rpc::{MockCluster, MockTable, RpcError};
use ccr_state::{JobStore, SqliteJobStore};

/// Hands out mock clusters by frontend host.
struct MockFactory {
    clusters: HashMap<String, MockCluster>,
}

impl ClusterFactory for MockFactory {
    type Cluster = MockCluster;

    fn connect(&self, spec: &Spec) -> SyncResult<MockCluster> {
        self.clusters
            .get(&spec.host)
            .cloned()
            .ok_or_else(|| RpcError::Transport(format!("no route to {}", spec.host)).into())
    }
}

fn spec(host: &str, database: &str, table: &str) -> Spec {
    Spec {
        host: host.into(),
        port: 9030,
        thrift_port: 9020,
        user: "root".into(),
        database: database.into(),
        table: table.into(),
        ..Default::default()
    }
}

fn clusters() -> (MockCluster, MockCluster) {
    let src = MockCluster::new(10).with_backend(1, "10.0.0.1").with_table(
        MockTable::new("orders", 42).partition(100, "p1", vec![TabletMeta::new(500).with_replica(1, 1)]),
    );
    src.set_snapshot_commit_seq(7);

    let dest = MockCluster::new(20).with_backend(11, "10.1.0.1");
    dest.stage_restore_table(
        MockTable::new("orders", 77).partition(300, "p1", vec![TabletMeta::new(900).with_replica(2, 11)]),
    );
    (src, dest)
}

fn syncer(store: Arc<SqliteJobStore>, src: &MockCluster, dest: &MockCluster) -> Syncer<MockFactory> {
    let factory = MockFactory {
        clusters: HashMap::from([
            ("src-fe".to_string(), src.clone()),
            ("dest-fe".to_string(), dest.clone()),
        ]),
    };
    let settings = SyncSettings {
        sync_interval: Duration::from_secs(1),
        poll_interval: Duration::from_millis(100),
        ..SyncSettings::default()
    };
    Syncer::new(store, factory, settings)
}

fn stored_progress(store: &SqliteJobStore, name: &str) -> Option<JobProgress> {
    store
        .get_progress(name)
        .unwrap()
        .map(|data| JobProgress::from_json(&data).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_added_job_runs_full_sync() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    let (src, dest) = clusters();
    let syncer = syncer(store.clone(), &src, &dest);

    syncer
        .add_job("t1", spec("src-fe", "src_db", "orders"), spec("dest-fe", "dest_db", "orders"))
        .await
        .unwrap();
    assert_eq!(syncer.job_names(), vec!["t1".to_string()]);
    assert!(store.job_exists("t1").unwrap());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let progress = stored_progress(&store, "t1").unwrap();
    assert_eq!(progress.phase, SyncPhase::Incremental);
    assert_eq!(progress.commit_seq, 7);

    syncer.shutdown().await;
    assert!(syncer.job_names().is_empty());
}

#[tokio::test]
async fn test_add_job_rejects_existing_dest_table() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    let (src, _) = clusters();
    let dest = MockCluster::new(20).with_table(MockTable::new("orders", 5));
    let syncer = syncer(store.clone(), &src, &dest);

    let err = syncer
        .add_job("t1", spec("src-fe", "src_db", "orders"), spec("dest-fe", "dest_db", "orders"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Preflight(ref msg) if msg.contains("already exists")));
    assert!(!store.job_exists("t1").unwrap());
    assert!(syncer.job_names().is_empty());
}

#[tokio::test]
async fn test_add_job_rejects_duplicate_name() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    store.add_job("t1", "{}").unwrap();
    let (src, dest) = clusters();
    let syncer = syncer(store, &src, &dest);

    let err = syncer
        .add_job("t1", spec("src-fe", "src_db", "orders"), spec("dest-fe", "dest_db", "orders"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AlreadyExists(_)));
}

#[tokio::test(start_paused = true)]
async fn test_recover_resumes_stored_jobs() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    let (src, dest) = clusters();

    {
        let first = syncer(store.clone(), &src, &dest);
        first
            .add_job("t1", spec("src-fe", "src_db", "orders"), spec("dest-fe", "dest_db", "orders"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        first.shutdown().await;
    }

    // A job whose cluster cannot be reached is skipped, not fatal.
    store
        .add_job(
            "orphan",
            &JobDefinition::new(
                "orphan",
                spec("gone-fe", "db", "t"),
                spec("gone-fe", "db", "t"),
            )
            .unwrap()
            .to_json()
            .unwrap(),
        )
        .unwrap();

    let second = syncer(store.clone(), &src, &dest);
    assert_eq!(second.recover().await.unwrap(), 1);
    assert_eq!(second.job_names(), vec!["t1".to_string()]);

    second.shutdown().await;
    assert_eq!(src.snapshot_requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_job_deletes_definition_and_progress() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    let (src, dest) = clusters();
    let syncer = syncer(store.clone(), &src, &dest);

    syncer
        .add_job("t1", spec("src-fe", "src_db", "orders"), spec("dest-fe", "dest_db", "orders"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    syncer.remove_job("t1").await.unwrap();
    assert!(!store.job_exists("t1").unwrap());
    assert!(stored_progress(&store, "t1").is_none());
    assert!(syncer.job_names().is_empty());

    assert!(matches!(
        syncer.remove_job("t1").await,
        Err(SyncError::JobNotFound(_))
    ));
}

/// Writes a definition the way `ccr-syncer create` does, without first-run checks.
fn register(store: &SqliteJobStore, name: &str) {
    let def = JobDefinition::new(
        name,
        spec("src-fe", "src_db", "orders"),
        spec("dest-fe", "dest_db", "orders"),
    )
    .unwrap();
    store.add_job(name, &def.to_json().unwrap()).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_recover_checks_registered_job_against_existing_dest_table() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    register(&store, "t1");
    let (src, _) = clusters();
    let dest = MockCluster::new(20).with_table(MockTable::new("orders", 5));
    let syncer = syncer(store.clone(), &src, &dest);

    assert_eq!(syncer.recover().await.unwrap(), 0);
    assert!(syncer.job_names().is_empty());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(src.snapshot_requests().is_empty());
    assert!(dest.restores().is_empty());
    assert!(stored_progress(&store, "t1").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_recover_runs_first_run_for_registered_job() {
    let store = Arc::new(SqliteJobStore::in_memory().unwrap());
    register(&store, "t1");
    let (src, dest) = clusters();
    let syncer = syncer(store.clone(), &src, &dest);

    assert_eq!(syncer.recover().await.unwrap(), 1);

    // Ids resolved by the first run are saved with the definition.
    let stored = JobDefinition::from_json(&store.get_job("t1").unwrap().unwrap()).unwrap();
    assert_eq!(stored.src.table_id, 42);
    assert_eq!(stored.src.db_id, 10);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(stored_progress(&store, "t1").unwrap().commit_seq, 7);

    syncer.shutdown().await;
}
