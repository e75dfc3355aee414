//! Names shared with the clusters. These formats must not change.

use crate::spec::Spec;

/// Whether a snapshot covers the whole table or only some partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Full,
    /// Not taken by this syncer. The `ccrp` prefix is part of the shared
    /// naming scheme, so names built here never collide with partial
    /// snapshots taken by other syncers on the same cluster.
    Partial,
}

impl SnapshotKind {
    fn prefix(self) -> &'static str {
        match self {
            SnapshotKind::Full => "ccrs",
            SnapshotKind::Partial => "ccrp",
        }
    }
}

/// `ccrs_<job>_<sync_id>` or `ccrp_<job>_<sync_id>`.
pub fn snapshot_label(kind: SnapshotKind, job_name: &str, sync_id: i64) -> String {
    format!("{}_{}_{}", kind.prefix(), job_name, sync_id)
}

/// `<snapshot>_r_<unix_secs>`; empty when there is no snapshot.
pub fn restore_label(snapshot_name: &str, unix_secs: i64) -> String {
    if snapshot_name.is_empty() {
        return String::new();
    }
    format!("{}_r_{}", snapshot_name, unix_secs)
}

/// `ccr_sync_job:<database>:<table>:<commit_seq>`.
///
/// A pure function of the destination and commit sequence, so a retried
/// begin-transaction reuses the same label.
pub fn txn_label(dest: &Spec, commit_seq: i64) -> String {
    format!(
        "ccr_sync_job:{}:{}:{}",
        dest.database, dest.table, commit_seq
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_labels() {
        assert_eq!(snapshot_label(SnapshotKind::Full, "t1", 3), "ccrs_t1_3");
        assert_eq!(snapshot_label(SnapshotKind::Partial, "t1", 3), "ccrp_t1_3");
    }

    #[test]
    fn test_restore_label() {
        assert_eq!(restore_label("ccrs_t1_3", 1700000000), "ccrs_t1_3_r_1700000000");
        assert_eq!(restore_label("", 1700000000), "");
    }

    #[test]
    fn test_txn_label_is_deterministic() {
        let dest = Spec {
            database: "db".into(),
            table: "orders".into(),
            ..Default::default()
        };
        assert_eq!(txn_label(&dest, 55), "ccr_sync_job:db:orders:55");
        assert_eq!(txn_label(&dest, 55), txn_label(&dest.clone(), 55));
    }
}
