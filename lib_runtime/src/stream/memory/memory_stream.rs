use std::sync::Arc;

use tracing::{debug, info};

use super::registry::TopicRegistry;
use super::topic::Topic;
use crate::stream::api::{Consumer, Producer, Stream};
use crate::stream::error::StreamError;
use crate::stream::schema::Schema;

/// # Memory Stream
///
/// A handle on one topic of a `TopicRegistry`. Any number of handles may be
/// open on the same topic; they share its producer and consumers.
pub struct MemoryStream<T> {
    registry: TopicRegistry,
    topic: Arc<Topic<T>>,
}

impl<T: Send + Sync + 'static> MemoryStream<T> {
    /// Binds to the topic named `topic`, creating it with a fresh producer
    /// (next id 0) and no consumers if the registry does not hold it yet.
    ///
    /// Fails with `TypeMismatch` when the topic already exists for another
    /// value type.
    pub fn open<S>(registry: &TopicRegistry, topic: &str, schema: S) -> Result<Self, StreamError>
    where
        S: Schema<Value = T>,
    {
        Self::open_shared(registry, topic, Arc::new(schema))
    }

    pub fn open_shared(
        registry: &TopicRegistry,
        topic: &str,
        schema: Arc<dyn Schema<Value = T>>,
    ) -> Result<Self, StreamError> {
        let topic = registry.get_or_create(topic, schema)?;
        debug!("Stream handle opened on topic '{}'", topic.name());
        Ok(Self {
            registry: registry.clone(),
            topic,
        })
    }
}

impl<T: Send + Sync + 'static> Stream<T> for MemoryStream<T> {
    fn topic(&self) -> &str {
        self.topic.name()
    }

    fn create_producer(&self) -> Arc<dyn Producer<T>> {
        self.topic.producer()
    }

    fn create_consumer(&self, name: &str) -> Arc<dyn Consumer<T>> {
        self.topic.consumer(name)
    }

    fn last_message_id(&self) -> Option<u64> {
        self.topic.last_message_id()
    }

    fn reset(&self) {
        info!("Resetting topic '{}'", self.topic.name());
        self.topic.retire();
        self.registry.remove(&self.topic);
    }

    fn close(&self) {
        debug!("Stream handle on topic '{}' closed", self.topic.name());
    }
}
