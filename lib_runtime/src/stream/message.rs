use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::error::StreamError;
use super::schema::Schema;

/// String-keyed attributes used for application-level routing (e.g. `type`, `entity`).
pub type Properties = BTreeMap<String, String>;

/// # Message
///
/// Immutable envelope produced by `Producer::send`. Cloning is cheap: clones
/// share the same payload and the same decode cache, so a message fanned out to
/// several consumers is decoded at most once.
pub struct Message<T> {
    inner: Arc<MessageInner<T>>,
}

struct MessageInner<T> {
    id: u64,
    payload: Bytes,
    properties: Properties,
    timestamp: Option<DateTime<Utc>>,
    schema: Arc<dyn Schema<Value = T>>,
    value: OnceLock<Result<T, StreamError>>,
}

impl<T: Send + Sync + 'static> Message<T> {
    /// Builds a message around an already encoded payload. Backends call this
    /// once the id is assigned.
    pub fn new(
        id: u64,
        payload: Bytes,
        schema: Arc<dyn Schema<Value = T>>,
        properties: Properties,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            inner: Arc::new(MessageInner {
                id,
                payload,
                properties,
                timestamp,
                schema,
                value: OnceLock::new(),
            }),
        }
    }

    /// Topic-scoped, strictly increasing id assigned at send time.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The raw encoded payload.
    pub fn payload(&self) -> &Bytes {
        &self.inner.payload
    }

    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.inner.properties.get(key).map(String::as_str)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner.timestamp
    }

    /// The decoded value. The payload is decoded on first access only; the
    /// outcome, including a decode failure, is cached for the message lifetime.
    pub fn value(&self) -> Result<&T, StreamError> {
        self.inner
            .value
            .get_or_init(|| self.inner.schema.decode(&self.inner.payload))
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl<T> Clone for Message<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.inner.id)
            .field("payload_len", &self.inner.payload.len())
            .field("properties", &self.inner.properties)
            .field("timestamp", &self.inner.timestamp)
            .finish()
    }
}

impl<T> fmt::Display for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.id)
    }
}
