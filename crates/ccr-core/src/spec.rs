use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Connection and naming details for one side of a replication job.
///
/// An empty `table` means the spec names a whole database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    /// Frontend host.
    pub host: String,
    /// Frontend SQL (query) port.
    pub port: u16,
    /// Frontend thrift RPC port.
    pub thrift_port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    /// Numeric database id, resolved during the first run.
    #[serde(default)]
    pub db_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub table: String,
    /// Numeric table id, resolved during the first run (source) or after restore (dest).
    #[serde(default)]
    pub table_id: i64,
}

impl Spec {
    /// Validate that every field needed to reach the cluster is present.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::InvalidSpec("host is empty".into()));
        }
        if self.port == 0 {
            return Err(Error::InvalidSpec("port is empty".into()));
        }
        if self.thrift_port == 0 {
            return Err(Error::InvalidSpec("thrift port is empty".into()));
        }
        if self.user.is_empty() {
            return Err(Error::InvalidSpec("user is empty".into()));
        }
        if self.database.is_empty() {
            return Err(Error::InvalidSpec("database is empty".into()));
        }
        Ok(())
    }

    /// Whether this spec names a single table.
    pub fn is_table(&self) -> bool {
        !self.table.is_empty()
    }

    /// `<database>.<table>` for table specs, `<database>` otherwise.
    pub fn qualified_name(&self) -> String {
        if self.is_table() {
            format!("{}.{}", self.database, self.table)
        } else {
            self.database.clone()
        }
    }
}

impl fmt::Display for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.user,
            self.host,
            self.port,
            self.qualified_name()
        )
    }
}

/// Whether a job replicates a whole database or a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    #[serde(rename = "db")]
    Database,
    Table,
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncType::Database => write!(f, "db"),
            SyncType::Table => write!(f, "table"),
        }
    }
}

/// The persisted definition of a replication job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub sync_type: SyncType,
    pub src: Spec,
    pub dest: Spec,
}

impl JobDefinition {
    /// Build a definition, validating both specs and inferring the sync type.
    ///
    /// Source and destination must agree on whether they name a table.
    pub fn new(name: impl Into<String>, src: Spec, dest: Spec) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidJob("name is empty".into()));
        }

        src.validate()
            .map_err(|e| Error::InvalidJob(format!("src spec is invalid: {}", e)))?;
        dest.validate()
            .map_err(|e| Error::InvalidJob(format!("dest spec is invalid: {}", e)))?;

        if src.is_table() != dest.is_table() {
            return Err(Error::InvalidJob(
                "src/dest are not both db or table sync".into(),
            ));
        }

        let sync_type = if src.is_table() {
            SyncType::Table
        } else {
            SyncType::Database
        };

        Ok(Self {
            name,
            sync_type,
            src,
            dest,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}
