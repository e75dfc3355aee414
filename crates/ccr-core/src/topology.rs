use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A backend (storage node) of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub id: i64,
    pub host: String,
    pub heartbeat_port: u16,
    pub be_port: u16,
    pub http_port: u16,
    pub brpc_port: u16,
}

impl Backend {
    pub fn http_port_str(&self) -> String {
        self.http_port.to_string()
    }
}

/// One replica of a tablet, hosted on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaMeta {
    pub id: i64,
    pub tablet_id: i64,
    pub backend_id: i64,
}

/// A tablet and its replicas, keyed by replica id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabletMeta {
    pub id: i64,
    pub replicas: BTreeMap<i64, ReplicaMeta>,
}

impl TabletMeta {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            replicas: BTreeMap::new(),
        }
    }

    /// Add a replica of this tablet on `backend_id`.
    pub fn with_replica(mut self, replica_id: i64, backend_id: i64) -> Self {
        self.replicas.insert(
            replica_id,
            ReplicaMeta {
                id: replica_id,
                tablet_id: self.id,
                backend_id,
            },
        );
        self
    }

    /// The replica with the lowest id.
    pub fn first_replica(&self) -> Option<&ReplicaMeta> {
        self.replicas.values().next()
    }
}

/// Receipt for one tablet ingested on one backend, needed to commit a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabletCommitInfo {
    pub tablet_id: i64,
    pub backend_id: i64,
}

/// Host and port a destination backend uses to reach a source backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAddr {
    pub ip: String,
    pub port: u16,
}
