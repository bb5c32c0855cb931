//! # Memory Producer
//!
//! The single publisher of a memory topic. A send is a zero-copy fan-out: the
//! payload is encoded once, wrapped in one `Message` (whose inner state is
//! behind an `Arc`), and every registered consumer receives a clone of that
//! handle rather than a copy of the bytes.
//!
//! ## Send sequence
//!
//! 1.  **Encode** the value with the topic schema. A failure surfaces as
//!     `TypeMismatch` and does not consume an id.
//! 2.  **Assign and fan out** under the subscriber lock: the next id is taken
//!     and the message is appended to the buffer of each consumer registered
//!     at that moment. Consumers registered later never see it.
//! 3.  **Yield** once to the scheduler so a tight send loop cannot starve the
//!     consumers waiting on the other side.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use tracing::debug;

use super::topic::Subscribers;
use crate::stream::api::Producer;
use crate::stream::error::StreamError;
use crate::stream::message::{Message, Properties};
use crate::stream::schema::Schema;

/// # Memory Producer
///
/// Shared by every `MemoryStream` handle bound to the same topic.
pub struct MemoryProducer<T> {
    topic: String,
    schema: Arc<dyn Schema<Value = T>>,
    subscribers: Arc<Subscribers<T>>,
}

impl<T: Send + Sync + 'static> MemoryProducer<T> {
    pub(crate) fn new(
        topic: &str,
        schema: Arc<dyn Schema<Value = T>>,
        subscribers: Arc<Subscribers<T>>,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            schema,
            subscribers,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn close_topic(&self) {
        self.subscribers.broadcast_end_of_stream();
    }
}

impl<T: Send + Sync + 'static> Producer<T> for MemoryProducer<T> {
    fn send<'a>(
        &'a self,
        value: &'a T,
        properties: Properties,
        timestamp: Option<DateTime<Utc>>,
    ) -> BoxFuture<'a, Result<Message<T>, StreamError>> {
        Box::pin(async move {
            let payload = self.schema.encode(value)?;
            let schema = Arc::clone(&self.schema);
            let message = self
                .subscribers
                .publish(|id| Message::new(id, payload, schema, properties, timestamp));

            tokio::task::yield_now().await;
            Ok(message)
        })
    }

    fn close(&self) {
        debug!("Producer on topic '{}' closing", self.topic);
        self.close_topic();
    }
}
