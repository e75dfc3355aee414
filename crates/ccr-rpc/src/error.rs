use thiserror::Error;

use crate::types::StatusCode;

/// Errors from cluster RPC and SQL calls.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote status {code:?}: {message}")]
    Status { code: StatusCode, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("sql error: {0}")]
    Sql(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RpcError {
    pub fn not_found(what: impl Into<String>) -> Self {
        RpcError::NotFound(what.into())
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::Transport(_)
                | RpcError::Status {
                    code: StatusCode::Timeout | StatusCode::TooManyTasks,
                    ..
                }
        )
    }

    /// Check if the remote reported the object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RpcError::NotFound(_)
                | RpcError::Status {
                    code: StatusCode::NotFound,
                    ..
                }
        )
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(RpcError::Transport("reset".into()).is_retryable());
        assert!(RpcError::Status {
            code: StatusCode::Timeout,
            message: String::new()
        }
        .is_retryable());
        assert!(!RpcError::not_found("table").is_retryable());

        assert!(RpcError::not_found("table").is_not_found());
        assert!(RpcError::Status {
            code: StatusCode::NotFound,
            message: String::new()
        }
        .is_not_found());
        assert!(!RpcError::Sql("syntax".into()).is_not_found());
    }
}
