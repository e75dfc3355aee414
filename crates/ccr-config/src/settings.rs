use std::time::Duration;

use ccr_core::SyncSettings;
use serde::Deserialize;

use crate::env::resolve_env;
use crate::error::{ConfigError, ConfigResult};

/// Job Store location used when `[store] path` is not set.
pub const DEFAULT_STORE_PATH: &str = "ccr.db";

/// Syncer settings as parsed from `ccr.toml`. Every table is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncConfig {
    /// Seconds between two sync ticks of a job.
    pub interval_secs: Option<u64>,
}

/// Backup/restore status polling.
#[derive(Debug, Default, Deserialize)]
pub struct PollConfig {
    pub interval_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestConfig {
    /// Ingest RPCs in flight per upsert.
    pub max_concurrency: Option<usize>,
}

/// Progress write retry backoff.
#[derive(Debug, Default, Deserialize)]
pub struct ProgressConfig {
    pub retry_base_ms: Option<u64>,
    pub retry_max_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// SQLite file; supports `${VAR}` expansion.
    pub path: Option<String>,
    pub read_attempts: Option<u32>,
}

impl SettingsConfig {
    /// Parse settings from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: SettingsConfig = toml::from_str(toml_str)?;
        Ok(config)
    }

    /// Engine settings, with defaults for anything not configured.
    pub fn to_sync_settings(&self) -> ConfigResult<SyncSettings> {
        let defaults = SyncSettings::default();

        let sync_interval = secs("sync.interval_secs", self.sync.interval_secs)?
            .unwrap_or(defaults.sync_interval);
        let poll_interval = secs("poll.interval_secs", self.poll.interval_secs)?
            .unwrap_or(defaults.poll_interval);
        let poll_max_retries =
            non_zero("poll.max_retries", self.poll.max_retries)?.unwrap_or(defaults.poll_max_retries);
        let ingest_concurrency = non_zero("ingest.max_concurrency", self.ingest.max_concurrency)?
            .unwrap_or(defaults.ingest_concurrency);
        let store_read_attempts = non_zero("store.read_attempts", self.store.read_attempts)?
            .unwrap_or(defaults.store_read_attempts);

        let progress_retry_base = millis("progress.retry_base_ms", self.progress.retry_base_ms)?
            .unwrap_or(defaults.progress_retry_base);
        let progress_retry_max = millis("progress.retry_max_ms", self.progress.retry_max_ms)?
            .unwrap_or(defaults.progress_retry_max)
            .max(progress_retry_base);

        Ok(SyncSettings {
            sync_interval,
            poll_interval,
            poll_max_retries,
            progress_retry_base,
            progress_retry_max,
            store_read_attempts,
            ingest_concurrency,
        })
    }

    /// The resolved Job Store path.
    pub fn store_path(&self) -> ConfigResult<String> {
        match &self.store.path {
            Some(path) => resolve_env(path),
            None => Ok(DEFAULT_STORE_PATH.to_string()),
        }
    }
}

fn non_zero<T: Default + PartialEq>(field: &str, value: Option<T>) -> ConfigResult<Option<T>> {
    match value {
        Some(v) if v == T::default() => Err(ConfigError::ZeroValue {
            field: field.to_string(),
        }),
        other => Ok(other),
    }
}

fn secs(field: &str, value: Option<u64>) -> ConfigResult<Option<Duration>> {
    Ok(non_zero(field, value)?.map(Duration::from_secs))
}

fn millis(field: &str, value: Option<u64>) -> ConfigResult<Option<Duration>> {
    Ok(non_zero(field, value)?.map(Duration::from_millis))
}
