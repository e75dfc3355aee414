//! Cross-cluster table replication: full sync via snapshot/restore, then
//! incremental sync by replaying the source binlog.

mod error;
mod full_sync;
mod incremental;
pub mod ingest;
mod job;
pub mod poll;
pub mod progress;
mod syncer;

pub use error::{SyncError, SyncResult};
pub use ingest::IngestionCoordinator;
pub use job::{validate_new_job, Job, Lifecycle, StopHandle};
pub use poll::{poll_until, PollOutcome};
pub use progress::{PersistHealth, ProgressStore};
pub use syncer::{ClusterFactory, Syncer};
