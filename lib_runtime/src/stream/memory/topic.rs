use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, trace};

use super::consumer::{Delivery, MemoryConsumer};
use super::producer::MemoryProducer;
use crate::stream::message::Message;
use crate::stream::schema::Schema;

/// A registry entry: one producer and the consumers subscribed by name.
pub(crate) struct Topic<T> {
    name: String,
    subscribers: Arc<Subscribers<T>>,
    producer: Arc<MemoryProducer<T>>,
    retired: AtomicBool,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub(crate) fn new(name: &str, schema: Arc<dyn Schema<Value = T>>) -> Self {
        let subscribers = Arc::new(Subscribers::new(name));
        let producer = Arc::new(MemoryProducer::new(
            name,
            schema,
            Arc::clone(&subscribers),
        ));
        Self {
            name: name.to_string(),
            subscribers,
            producer,
            retired: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn producer(&self) -> Arc<MemoryProducer<T>> {
        Arc::clone(&self.producer)
    }

    pub(crate) fn consumer(&self, name: &str) -> Arc<MemoryConsumer<T>> {
        self.subscribers.get_or_register(name)
    }

    pub(crate) fn last_message_id(&self) -> Option<u64> {
        if self.retired.load(Ordering::Acquire) {
            return None;
        }
        self.subscribers.last_message_id()
    }

    /// Drains every consumer, then closes the producer so their streams end.
    /// The topic stops reporting message ids; the registry entry is removed by
    /// the caller.
    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
        self.subscribers.clear_all();
        self.producer.close_topic();
        debug!("Topic '{}' retired", self.name);
    }
}

/// The live subscriber set of a topic, together with the id counter.
///
/// Both sit behind one lock so id assignment, fan-out, registration and
/// deregistration are serialized: every consumer sees messages in id order and
/// a send never races a consumer joining or leaving.
pub(crate) struct Subscribers<T> {
    topic: String,
    inner: Mutex<SubscriberSet<T>>,
}

struct SubscriberSet<T> {
    next_id: u64,
    consumers: HashMap<String, Arc<MemoryConsumer<T>>>,
}

impl<T: Send + Sync + 'static> Subscribers<T> {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            inner: Mutex::new(SubscriberSet {
                next_id: 0,
                consumers: HashMap::new(),
            }),
        }
    }

    fn get_or_register(self: &Arc<Self>, name: &str) -> Arc<MemoryConsumer<T>> {
        let mut set = self.lock();
        if let Some(existing) = set.consumers.get(name) {
            return Arc::clone(existing);
        }

        let consumer = Arc::new(MemoryConsumer::new(name, &self.topic, Arc::downgrade(self)));
        set.consumers.insert(name.to_string(), Arc::clone(&consumer));
        info!("Consumer '{}' registered on topic '{}'", name, self.topic);
        consumer
    }

    /// Removes `consumer` if it is still the one registered under its name.
    pub(crate) fn deregister(&self, consumer: &MemoryConsumer<T>) {
        let mut set = self.lock();
        let is_same = set
            .consumers
            .get(consumer.name_str())
            .is_some_and(|registered| std::ptr::eq(Arc::as_ptr(registered), consumer));

        if is_same {
            set.consumers.remove(consumer.name_str());
            info!("Consumer '{}' removed from topic '{}'", consumer.name_str(), self.topic);
        }
    }

    /// Assigns the next id, builds the message and appends it to every
    /// registered consumer.
    pub(crate) fn publish(&self, build: impl FnOnce(u64) -> Message<T>) -> Message<T> {
        let mut set = self.lock();
        let id = set.next_id;
        set.next_id += 1;

        let message = build(id);
        for consumer in set.consumers.values() {
            consumer.enqueue(Delivery::Message(message.clone()));
        }
        trace!(
            "Message {} fanned out to {} consumer(s) on topic '{}'",
            id,
            set.consumers.len(),
            self.topic
        );
        message
    }

    pub(crate) fn broadcast_end_of_stream(&self) {
        let set = self.lock();
        for consumer in set.consumers.values() {
            consumer.enqueue(Delivery::EndOfStream);
        }
        debug!(
            "End-of-stream sent to {} consumer(s) on topic '{}'",
            set.consumers.len(),
            self.topic
        );
    }

    fn clear_all(&self) {
        let set = self.lock();
        for consumer in set.consumers.values() {
            consumer.clear();
        }
    }

    fn last_message_id(&self) -> Option<u64> {
        self.lock().next_id.checked_sub(1)
    }

    fn lock(&self) -> MutexGuard<'_, SubscriberSet<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
