use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("column {0} is missing from the row")]
    MissingColumn(String),

    #[error("column {column} holds {value:?}, not a number")]
    InvalidNumber { column: String, value: String },

    #[error("no such date: {0}")]
    InvalidDate(String),

    #[error("unknown weight unit {0:?}")]
    InvalidWeightUnit(String),

    #[error("order has no column {0}")]
    UnknownColumn(String),

    #[error("column {column} cannot hold a {found} value")]
    FieldType { column: String, found: &'static str },

    #[error("failed to read transformations: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid transformations file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A message property names a category no handler is registered for.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("unknown routing key {key}={value:?}")]
    UnknownRoutingKey { key: &'static str, value: String },
}

impl RoutingError {
    pub fn entity(value: Option<&str>) -> Self {
        RoutingError::UnknownRoutingKey {
            key: "entity",
            value: value.unwrap_or_default().to_string(),
        }
    }

    pub fn message_type(value: Option<&str>) -> Self {
        RoutingError::UnknownRoutingKey {
            key: "type",
            value: value.unwrap_or_default().to_string(),
        }
    }
}
