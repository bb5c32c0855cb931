//! # Topic Registry
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::topic::Topic;
use crate::stream::error::StreamError;
use crate::stream::schema::Schema;

struct TopicEntry {
    value_type: &'static str,
    topic: Arc<dyn Any + Send + Sync>,
}

/// Owns the name → topic map of the memory backend.
///
/// Cloning yields another handle on the same map. Build one per application
/// (or per test) and pass it to every stream that should see the same topics.
#[derive(Clone, Default)]
pub struct TopicRegistry {
    topics: Arc<Mutex<HashMap<String, TopicEntry>>>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the live topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.lock().contains_key(topic)
    }

    pub(crate) fn get_or_create<T>(
        &self,
        name: &str,
        schema: Arc<dyn Schema<Value = T>>,
    ) -> Result<Arc<Topic<T>>, StreamError>
    where
        T: Send + Sync + 'static,
    {
        let mut topics = self.lock();

        if let Some(entry) = topics.get(name) {
            return Arc::clone(&entry.topic)
                .downcast::<Topic<T>>()
                .map_err(|_| {
                    StreamError::type_mismatch(
                        entry.value_type,
                        format!("topic '{}' cannot be opened as {}", name, type_name::<T>()),
                    )
                });
        }

        let topic = Arc::new(Topic::new(name, schema));
        topics.insert(
            name.to_string(),
            TopicEntry {
                value_type: type_name::<T>(),
                topic: Arc::clone(&topic) as Arc<dyn Any + Send + Sync>,
            },
        );
        info!("Topic '{}' created", name);
        Ok(topic)
    }

    /// Removes the entry for `topic`, unless the name has since been taken by
    /// a newer topic.
    pub(crate) fn remove<T>(&self, topic: &Arc<Topic<T>>)
    where
        T: Send + Sync + 'static,
    {
        let mut topics = self.lock();
        let is_same = topics
            .get(topic.name())
            .is_some_and(|entry| Arc::as_ptr(&entry.topic) as *const () == Arc::as_ptr(topic) as *const ());

        if is_same {
            topics.remove(topic.name());
            info!("Topic '{}' removed", topic.name());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicEntry>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::schema::JsonSchema;

    fn schema<T>() -> Arc<dyn Schema<Value = T>>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        Arc::new(JsonSchema::<T>::new())
    }

    #[test]
    fn same_name_yields_same_topic() {
        let registry = TopicRegistry::new();
        let a = registry.get_or_create("orders", schema::<String>()).unwrap();
        let b = registry.get_or_create("orders", schema::<String>()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.topics(), vec!["orders".to_string()]);
    }

    #[test]
    fn clones_share_the_map() {
        let registry = TopicRegistry::new();
        let other = registry.clone();
        registry.get_or_create("orders", schema::<String>()).unwrap();
        assert!(other.contains("orders"));
    }

    #[test]
    fn separate_registries_are_isolated() {
        let a = TopicRegistry::new();
        let b = TopicRegistry::new();
        a.get_or_create("orders", schema::<String>()).unwrap();
        assert!(!b.contains("orders"));
    }

    #[test]
    fn second_value_type_is_rejected() {
        let registry = TopicRegistry::new();
        registry.get_or_create("orders", schema::<String>()).unwrap();
        let err = registry.get_or_create("orders", schema::<u64>()).err().unwrap();
        assert!(matches!(err, StreamError::TypeMismatch { ref expected, .. } if expected.contains("String")));
    }

    #[test]
    fn remove_ignores_a_replaced_topic() {
        let registry = TopicRegistry::new();
        let old = registry.get_or_create("orders", schema::<String>()).unwrap();
        registry.remove(&old);
        let new = registry.get_or_create("orders", schema::<String>()).unwrap();

        registry.remove(&old);
        assert!(registry.contains("orders"));
        registry.remove(&new);
        assert!(!registry.contains("orders"));
    }
}
