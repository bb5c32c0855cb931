use thiserror::Error;

use super::kind::StreamKind;

/// Errors raised by the stream layer.
///
/// `Clone` so a failed decode can be memoised on the `Message` and handed back
/// on every subsequent read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    /// A value or payload does not match the type a schema (or topic) is bound to.
    #[error("type mismatch: expected {expected}: {detail}")]
    TypeMismatch { expected: String, detail: String },

    /// The requested backend cannot build streams.
    #[error("stream backend {0} is not available")]
    BackendUnavailable(StreamKind),

    /// A backend tag that names no known backend.
    #[error("unknown stream kind: {0}")]
    UnknownStreamKind(String),
}

impl StreamError {
    pub(crate) fn type_mismatch(expected: impl Into<String>, detail: impl ToString) -> Self {
        StreamError::TypeMismatch {
            expected: expected.into(),
            detail: detail.to_string(),
        }
    }
}
