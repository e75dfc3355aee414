use thiserror::Error;

/// Errors that can occur when parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("{field} must be greater than zero")]
    ZeroValue { field: String },

    #[error("environment variable '{name}' is not set")]
    MissingEnvVar { name: String },

    #[error("unterminated '${{' in '{value}'")]
    UnterminatedVar { value: String },

    #[error("invalid job: {0}")]
    InvalidJob(#[from] ccr_core::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
