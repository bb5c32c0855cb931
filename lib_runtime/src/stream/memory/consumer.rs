//! # Memory Consumer
//!
//! A named subscriber with its own FIFO buffer. The producer appends to the
//! buffer under the topic lock; `recv` pops from the front and parks on a
//! `Notify` while the buffer is empty.
//!
//! `close` cancels a `CancellationToken` that every parked `recv` selects on,
//! so a closed consumer never leaves a caller hanging.
//!
//! There is no acknowledgment tracking: `ack` is accepted and ignored, and
//! anything still buffered is lost when the consumer is reset, closed or
//! dropped.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::BoxFuture;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::topic::Subscribers;
use crate::stream::api::{Consumer, ConsumerState};
use crate::stream::error::StreamError;
use crate::stream::message::Message;

/// An item in a consumer buffer.
pub(crate) enum Delivery<T> {
    Message(Message<T>),
    EndOfStream,
}

pub struct MemoryConsumer<T> {
    name: String,
    topic: String,
    subscribers: Weak<Subscribers<T>>,
    queue: Mutex<VecDeque<Delivery<T>>>,
    ready: Notify,
    closing: CancellationToken,
    state: Mutex<ConsumerState>,
}

impl<T: Send + Sync + 'static> MemoryConsumer<T> {
    pub(crate) fn new(name: &str, topic: &str, subscribers: Weak<Subscribers<T>>) -> Self {
        Self {
            name: name.to_string(),
            topic: topic.to_string(),
            subscribers,
            queue: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
            closing: CancellationToken::new(),
            state: Mutex::new(ConsumerState::Open),
        }
    }

    pub(crate) fn name_str(&self) -> &str {
        &self.name
    }

    pub(crate) fn enqueue(&self, delivery: Delivery<T>) {
        self.lock_queue().push_back(delivery);
        self.ready.notify_one();
    }

    pub(crate) fn clear(&self) {
        let dropped = {
            let mut queue = self.lock_queue();
            let dropped = queue.len();
            queue.clear();
            dropped
        };
        if dropped > 0 {
            debug!(
                "Consumer '{}' on topic '{}' discarded {} buffered item(s)",
                self.name, self.topic, dropped
            );
        }
    }

    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<Delivery<T>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ConsumerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync + 'static> Consumer<T> for MemoryConsumer<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn recv(&self) -> BoxFuture<'_, Option<Message<T>>> {
        Box::pin(async move {
            loop {
                if self.closing.is_cancelled() {
                    return None;
                }

                let next = self.lock_queue().pop_front();
                match next {
                    Some(Delivery::Message(message)) => {
                        trace!("Consumer '{}' received message {}", self.name, message.id());
                        return Some(message);
                    }
                    Some(Delivery::EndOfStream) => {
                        debug!("Consumer '{}' reached end of stream on topic '{}'", self.name, self.topic);
                        return None;
                    }
                    None => {}
                }

                tokio::select! {
                    _ = self.ready.notified() => {}
                    _ = self.closing.cancelled() => return None,
                }
            }
        })
    }

    fn ack(&self, message: &Message<T>) -> Result<(), StreamError> {
        trace!("Consumer '{}' acked message {} (no-op)", self.name, message.id());
        Ok(())
    }

    fn close(&self) {
        {
            let mut state = self.lock_state();
            if *state != ConsumerState::Open {
                return;
            }
            *state = ConsumerState::Closing;
        }

        self.closing.cancel();
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.deregister(self);
        }

        *self.lock_state() = ConsumerState::Closed;
        info!("Consumer '{}' on topic '{}' closed", self.name, self.topic);
    }

    fn reset(&self) {
        self.clear();
    }

    fn state(&self) -> ConsumerState {
        *self.lock_state()
    }

    fn pending(&self) -> usize {
        self.lock_queue().len()
    }
}
