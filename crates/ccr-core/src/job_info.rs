//! Helpers for the snapshot job-info blob returned by the source frontend.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::topology::{Backend, NetworkAddr};

/// Key the topology patch is stored under in the job-info object.
pub const EXTRA_INFO_KEY: &str = "extra_info";

const TABLE_COMMIT_SEQ_MAP_KEY: &str = "table_commit_seq_map";

/// Extract the per-table commit sequence map (table id -> commit seq).
pub fn extract_table_commit_seq_map(job_info: &[u8]) -> Result<HashMap<i64, i64>> {
    #[derive(Deserialize)]
    struct JobInfo {
        table_commit_seq_map: Option<HashMap<i64, i64>>,
    }

    let info: JobInfo = serde_json::from_slice(job_info)?;
    info.table_commit_seq_map
        .ok_or_else(|| Error::MissingJobInfoField(TABLE_COMMIT_SEQ_MAP_KEY.into()))
}

/// Source-cluster topology the destination needs to pull tablets directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub be_network_map: BTreeMap<i64, NetworkAddr>,
    pub token: String,
}

impl ExtraInfo {
    /// Build from source backends (addressed by their HTTP port) and an auth token.
    pub fn from_backends<'a>(
        backends: impl IntoIterator<Item = &'a Backend>,
        token: impl Into<String>,
    ) -> Self {
        let be_network_map = backends
            .into_iter()
            .map(|be| {
                (
                    be.id,
                    NetworkAddr {
                        ip: be.host.clone(),
                        port: be.http_port,
                    },
                )
            })
            .collect();

        Self {
            be_network_map,
            token: token.into(),
        }
    }
}

/// Return a copy of `job_info` with `extra` stored under [`EXTRA_INFO_KEY`].
///
/// All other fields are preserved.
pub fn patch_job_info(job_info: &[u8], extra: &ExtraInfo) -> Result<Vec<u8>> {
    let mut value: serde_json::Value = serde_json::from_slice(job_info)?;
    let object = value.as_object_mut().ok_or(Error::JobInfoNotObject)?;
    object.insert(EXTRA_INFO_KEY.to_string(), serde_json::to_value(extra)?);
    Ok(serde_json::to_vec(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(id: i64, host: &str) -> Backend {
        Backend {
            id,
            host: host.into(),
            heartbeat_port: 9050,
            be_port: 9060,
            http_port: 8040,
            brpc_port: 8060,
        }
    }

    #[test]
    fn test_extract_commit_seq_map() {
        let info = br#"{"name": "snap", "table_commit_seq_map": {"42": 1001, "43": 7}}"#;
        let map = extract_table_commit_seq_map(info).unwrap();
        assert_eq!(map.get(&42), Some(&1001));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_extract_commit_seq_map_missing() {
        let err = extract_table_commit_seq_map(br#"{"name": "snap"}"#).unwrap_err();
        assert!(matches!(err, Error::MissingJobInfoField(_)));

        assert!(extract_table_commit_seq_map(b"not json").is_err());
    }

    #[test]
    fn test_patch_preserves_fields() {
        let info = br#"{"name": "snap", "table_commit_seq_map": {"42": 1001}}"#;
        let extra = ExtraInfo::from_backends(&[backend(1, "10.0.0.1"), backend(2, "10.0.0.2")], "tok");

        let patched = patch_job_info(info, &extra).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&patched).unwrap();

        assert_eq!(value["name"], "snap");
        assert_eq!(value["table_commit_seq_map"]["42"], 1001);
        assert_eq!(value["extra_info"]["token"], "tok");
        assert_eq!(value["extra_info"]["be_network_map"]["2"]["ip"], "10.0.0.2");
        assert_eq!(value["extra_info"]["be_network_map"]["1"]["port"], 8040);
    }

    #[test]
    fn test_patch_rejects_non_object() {
        let extra = ExtraInfo::from_backends(&Vec::<Backend>::new(), "tok");
        assert!(matches!(
            patch_job_info(b"[1, 2]", &extra),
            Err(Error::JobInfoNotObject)
        ));
    }
}
