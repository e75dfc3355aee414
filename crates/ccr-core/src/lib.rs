pub mod binlog;
pub mod error;
pub mod job_info;
pub mod label;
pub mod progress;
pub mod settings;
pub mod spec;
pub mod topology;

pub use binlog::{AddPartition, Binlog, BinlogType, PartitionRecord, TableRecord, Upsert};
pub use error::{Error, Result};
pub use job_info::{extract_table_commit_seq_map, patch_job_info, ExtraInfo, EXTRA_INFO_KEY};
pub use label::{restore_label, snapshot_label, txn_label, SnapshotKind};
pub use progress::{FullSyncState, InFlightTxn, JobProgress, JobState, SyncPhase};
pub use settings::SyncSettings;
pub use spec::{JobDefinition, Spec, SyncType};
pub use topology::{Backend, NetworkAddr, ReplicaMeta, TabletCommitInfo, TabletMeta};
