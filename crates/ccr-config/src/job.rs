use ccr_core::{JobDefinition, Spec};
use serde::Deserialize;

use crate::env::resolve_env;
use crate::error::ConfigResult;

/// A job file: a name plus the source and destination cluster.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Unique job name.
    pub name: String,
    pub src: SpecConfig,
    pub dest: SpecConfig,
}

/// One side of a job as written in TOML.
///
/// String fields support `${VAR}` expansion. Leaving `table` out on both
/// sides makes a whole-database job.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecConfig {
    pub host: String,
    pub port: u16,
    pub thrift_port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub table: String,
}

impl SpecConfig {
    pub fn to_spec(&self) -> ConfigResult<Spec> {
        Ok(Spec {
            host: resolve_env(&self.host)?,
            port: self.port,
            thrift_port: self.thrift_port,
            user: resolve_env(&self.user)?,
            password: resolve_env(&self.password)?,
            database: resolve_env(&self.database)?,
            db_id: 0,
            table: resolve_env(&self.table)?,
            table_id: 0,
        })
    }
}

impl JobConfig {
    /// Parse a job file from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: JobConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Resolve environment references and build a validated definition.
    pub fn to_definition(&self) -> ConfigResult<JobDefinition> {
        let def = JobDefinition::new(&self.name, self.src.to_spec()?, self.dest.to_spec()?)?;
        Ok(def)
    }
}
