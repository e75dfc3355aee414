mod env;
mod error;
mod job;
mod settings;

pub use env::resolve_env;
pub use error::{ConfigError, ConfigResult};
pub use job::{JobConfig, SpecConfig};
pub use settings::{
    IngestConfig, PollConfig, ProgressConfig, SettingsConfig, StoreConfig, SyncConfig,
    DEFAULT_STORE_PATH,
};
