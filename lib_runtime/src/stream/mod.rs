//! # Streams
//!
//! Topic-based publish/subscribe. A collaborator opens a `Stream` for a topic,
//! takes the topic's `Producer` and one or more named `Consumer`s, and moves
//! `Message`s through them. Payloads are produced and read back through the
//! topic's `Schema`.
//!
//! Backends are chosen by `StreamKind` at construction time through
//! `open_stream`; the in-memory backend is the only one implemented.

mod api;
mod error;
mod kind;
mod message;
mod schema;

pub mod memory;

use std::sync::Arc;

pub use api::{messages, Consumer, ConsumerState, Producer, Stream};
pub use error::StreamError;
pub use kind::StreamKind;
pub use memory::{MemoryStream, TopicRegistry};
pub use message::{Message, Properties};
pub use schema::{JsonSchema, Schema};

/// Opens a stream on `topic` with the backend selected by `kind`.
pub fn open_stream<T, S>(
    kind: StreamKind,
    registry: &TopicRegistry,
    topic: &str,
    schema: S,
) -> Result<Arc<dyn Stream<T>>, StreamError>
where
    T: Send + Sync + 'static,
    S: Schema<Value = T>,
{
    match kind {
        StreamKind::Memory => Ok(Arc::new(MemoryStream::open(registry, topic, schema)?)),
        StreamKind::None => Err(StreamError::BackendUnavailable(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_kind_opens_a_stream() {
        let registry = TopicRegistry::new();
        let stream = open_stream(StreamKind::Memory, &registry, "t", JsonSchema::<u8>::new()).unwrap();
        assert_eq!(stream.topic(), "t");
        assert!(registry.contains("t"));
    }

    #[test]
    fn none_kind_is_unavailable() {
        let registry = TopicRegistry::new();
        let err = open_stream(StreamKind::None, &registry, "t", JsonSchema::<u8>::new()).err().unwrap();
        assert_eq!(err, StreamError::BackendUnavailable(StreamKind::None));
        assert!(!registry.contains("t"));
    }
}
