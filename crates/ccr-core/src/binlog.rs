use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Type tag of a binlog entry.
///
/// Only `Upsert` and `AddPartition` are interpreted by the engine; the other
/// tags are recognized so they do not fail as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinlogType {
    Upsert,
    AddPartition,
    CreateTable,
    DropPartition,
    DropTable,
    AlterJob,
    ModifyTableAddOrDropColumns,
    Dummy,
    AlterDatabaseProperty,
    ModifyTableProperty,
    Barrier,
    ModifyPartitions,
    ReplacePartitions,
    TruncateTable,
    RenameTable,
    RenameColumn,
    ModifyComment,
    ModifyViewDef,
    ReplaceTable,
    ModifyTableAddOrDropInvertedIndices,
    IndexChangeJob,
}

impl BinlogType {
    /// The wire tag used by the frontend.
    pub fn tag(self) -> i32 {
        match self {
            BinlogType::Upsert => 0,
            BinlogType::AddPartition => 1,
            BinlogType::CreateTable => 2,
            BinlogType::DropPartition => 3,
            BinlogType::DropTable => 4,
            BinlogType::AlterJob => 5,
            BinlogType::ModifyTableAddOrDropColumns => 6,
            BinlogType::Dummy => 7,
            BinlogType::AlterDatabaseProperty => 8,
            BinlogType::ModifyTableProperty => 9,
            BinlogType::Barrier => 10,
            BinlogType::ModifyPartitions => 11,
            BinlogType::ReplacePartitions => 12,
            BinlogType::TruncateTable => 13,
            BinlogType::RenameTable => 14,
            BinlogType::RenameColumn => 15,
            BinlogType::ModifyComment => 16,
            BinlogType::ModifyViewDef => 17,
            BinlogType::ReplaceTable => 18,
            BinlogType::ModifyTableAddOrDropInvertedIndices => 19,
            BinlogType::IndexChangeJob => 20,
        }
    }
}

impl TryFrom<i32> for BinlogType {
    type Error = Error;

    fn try_from(tag: i32) -> Result<Self> {
        let kind = match tag {
            0 => BinlogType::Upsert,
            1 => BinlogType::AddPartition,
            2 => BinlogType::CreateTable,
            3 => BinlogType::DropPartition,
            4 => BinlogType::DropTable,
            5 => BinlogType::AlterJob,
            6 => BinlogType::ModifyTableAddOrDropColumns,
            7 => BinlogType::Dummy,
            8 => BinlogType::AlterDatabaseProperty,
            9 => BinlogType::ModifyTableProperty,
            10 => BinlogType::Barrier,
            11 => BinlogType::ModifyPartitions,
            12 => BinlogType::ReplacePartitions,
            13 => BinlogType::TruncateTable,
            14 => BinlogType::RenameTable,
            15 => BinlogType::RenameColumn,
            16 => BinlogType::ModifyComment,
            17 => BinlogType::ModifyViewDef,
            18 => BinlogType::ReplaceTable,
            19 => BinlogType::ModifyTableAddOrDropInvertedIndices,
            20 => BinlogType::IndexChangeJob,
            other => return Err(Error::UnknownBinlogType(other)),
        };
        Ok(kind)
    }
}

impl fmt::Display for BinlogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One change-log entry as returned by the source frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binlog {
    /// Raw type tag; see [`BinlogType`].
    #[serde(rename = "type")]
    pub binlog_type: i32,
    pub commit_seq: i64,
    /// Type-specific JSON payload.
    pub data: String,
}

impl Binlog {
    pub fn new(kind: BinlogType, commit_seq: i64, data: impl Into<String>) -> Self {
        Self {
            binlog_type: kind.tag(),
            commit_seq,
            data: data.into(),
        }
    }

    /// Decode the type tag.
    pub fn kind(&self) -> Result<BinlogType> {
        BinlogType::try_from(self.binlog_type)
    }
}

/// Row-change payload: per table, the partitions that received a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upsert {
    pub commit_seq: i64,
    #[serde(default)]
    pub txn_id: i64,
    #[serde(default)]
    pub time_stamp: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub db_id: i64,
    /// Keyed by source table id.
    pub table_records: HashMap<i64, TableRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRecord {
    pub partition_records: Vec<PartitionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionRecord {
    pub partition_id: i64,
    #[serde(default)]
    pub range: String,
    /// The partition's new visible version.
    pub version: i64,
}

impl Upsert {
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| Error::MalformedRecord {
            kind: "upsert",
            message: e.to_string(),
        })
    }
}

/// Add-partition payload: the DDL fragment to append to `ALTER TABLE <table>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPartition {
    #[serde(default)]
    pub db_id: i64,
    pub table_id: i64,
    pub sql: String,
}

impl AddPartition {
    pub fn from_json(data: &str) -> Result<Self> {
        let record: AddPartition =
            serde_json::from_str(data).map_err(|e| Error::MalformedRecord {
                kind: "add partition",
                message: e.to_string(),
            })?;

        if record.sql.trim().is_empty() {
            return Err(Error::MalformedRecord {
                kind: "add partition",
                message: "sql is empty".into(),
            });
        }

        Ok(record)
    }
}
