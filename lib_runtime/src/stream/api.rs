//! # Stream Contracts
//!
//! The boundary surface every collaborator programs against. A backend (the
//! in-memory reference one today, a real broker later) implements these three
//! traits; collaborators never see its internal registry structures.
//!
//! Methods that suspend return a `BoxFuture` so the traits stay object safe and
//! handles can be passed around as `Arc<dyn Producer<T>>` / `Arc<dyn Consumer<T>>`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};

use super::error::StreamError;
use super::message::{Message, Properties};

/// # Stream
///
/// Binds a topic name and a schema to the topic's producer and its registry of
/// named consumers.
pub trait Stream<T>: Send + Sync {
    /// The topic this handle is bound to.
    fn topic(&self) -> &str;

    /// Returns the topic's singleton producer.
    fn create_producer(&self) -> Arc<dyn Producer<T>>;

    /// Returns the consumer registered under `name`, creating and registering
    /// it on first request.
    fn create_consumer(&self, name: &str) -> Arc<dyn Consumer<T>>;

    /// Highest id assigned on the topic so far, `None` when nothing was sent.
    fn last_message_id(&self) -> Option<u64>;

    /// Tears the topic down: the producer is closed, every consumer's buffer is
    /// cleared and the topic entry is removed. A stream opened afterwards for
    /// the same name starts over at id 0.
    fn reset(&self);

    /// Releases this handle. Shared topic state is left alone.
    fn close(&self);
}

/// # Producer
pub trait Producer<T>: Send + Sync {
    /// Encodes `value`, assigns the next id and delivers the message to every
    /// consumer registered on the topic at the time of the call, then yields to
    /// the scheduler once.
    fn send<'a>(
        &'a self,
        value: &'a T,
        properties: Properties,
        timestamp: Option<DateTime<Utc>>,
    ) -> BoxFuture<'a, Result<Message<T>, StreamError>>;

    /// Broadcasts end-of-stream to every registered consumer.
    fn close(&self);
}

/// Lifecycle of a consumer. `Closed` is the only terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Open,
    Closing,
    Closed,
}

/// # Consumer
pub trait Consumer<T>: Send + Sync {
    /// Durable name, unique within the topic.
    fn name(&self) -> &str;

    /// Waits for the next message in FIFO order. `None` means the stream is
    /// over: end-of-stream was dequeued or the consumer was closed.
    fn recv(&self) -> BoxFuture<'_, Option<Message<T>>>;

    /// Acknowledges a message. Backends offering at-least-once delivery must
    /// keep un-acked messages redeliverable across consumer restarts.
    fn ack(&self, message: &Message<T>) -> Result<(), StreamError>;

    /// Stops the consumer: pending and future `recv` calls observe termination
    /// and the name is deregistered from the topic.
    fn close(&self);

    /// Discards buffered, undelivered messages. Registration is unchanged.
    fn reset(&self);

    fn state(&self) -> ConsumerState;

    /// Number of buffered items not yet handed out by `recv`.
    fn pending(&self) -> usize;
}

/// Adapts a consumer into a `futures` stream of messages that ends when the
/// consumer terminates.
pub fn messages<T>(consumer: Arc<dyn Consumer<T>>) -> BoxStream<'static, Message<T>>
where
    T: Send + Sync + 'static,
{
    Box::pin(stream::unfold(consumer, |consumer| async move {
        let message = consumer.recv().await?;
        Some((message, consumer))
    }))
}
