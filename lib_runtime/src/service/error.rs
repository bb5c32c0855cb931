use thiserror::Error;

use crate::configs::ConfigError;
use crate::stream::StreamError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("duplicate service: {0}")]
    DuplicateName(String),

    #[error("invalid service registration: {0}")]
    InvalidArgument(String),

    /// Cooperative cancellation. Services must let it propagate out of `run()`.
    #[error("service cancelled")]
    Cancelled,

    #[error("service panicked: {detail}")]
    Panicked { detail: String },

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Any other failure raised inside a service.
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ServiceError::Cancelled)
    }
}
