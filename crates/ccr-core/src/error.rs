use thiserror::Error;

/// Errors that can occur in ccr-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("invalid job definition: {0}")]
    InvalidJob(String),

    #[error("malformed {kind} record: {message}")]
    MalformedRecord { kind: &'static str, message: String },

    #[error("job info is missing field '{0}'")]
    MissingJobInfoField(String),

    #[error("job info is not a json object")]
    JobInfoNotObject,

    #[error("unknown binlog type: {0}")]
    UnknownBinlogType(i32),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
