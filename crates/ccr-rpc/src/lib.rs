mod client;
mod error;
mod mock;
mod types;

pub use client::{BackendClient, Cluster, FrontendClient, MetadataProvider, SqlGateway};
pub use error::{RpcError, RpcResult};
pub use mock::{MockBackend, MockCluster, MockTable};
pub use types::{
    BeginTxnResponse, IngestBinlogRequest, IngestBinlogResponse, SnapshotResponse, Status,
    StatusCode, UniqueId,
};
