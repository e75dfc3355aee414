use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ccr_config::{JobConfig, SettingsConfig};
use ccr_core::JobDefinition;
use ccr_state::SqliteJobStore;
use tracing::debug;

/// Load `ccr.toml`. A missing file means all defaults.
pub fn load_settings(path: &Path) -> Result<SettingsConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No settings file, using defaults");
        return Ok(SettingsConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let settings = SettingsConfig::parse(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    // Reject bad values up front rather than when a job starts.
    settings
        .to_sync_settings()
        .with_context(|| format!("Invalid settings in {}", path.display()))?;

    Ok(settings)
}

/// Open the job store named by the settings.
pub fn open_store(settings: &SettingsConfig) -> Result<SqliteJobStore> {
    let path = settings.store_path().context("Failed to resolve store path")?;
    SqliteJobStore::open(&path).with_context(|| format!("Failed to open job store: {}", path))
}

/// Parse and validate a job file.
pub fn load_job(path: &Path) -> Result<JobDefinition> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {}", path.display()))?;
    let config = JobConfig::parse(&content)
        .with_context(|| format!("Failed to parse job file: {}", path.display()))?;
    config
        .to_definition()
        .with_context(|| format!("Invalid job: {}", path.display()))
}
