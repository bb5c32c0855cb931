use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ConfigError;

/// # Config Tree
///
/// A resolved key/value tree. Keys are addressed by dotted paths such as
/// `"crisp.data_dir"`; a numeric segment indexes into a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: Value,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::from_value(Value::Object(Default::default()))
    }
}

impl ConfigTree {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.root);
        }
        path.split('.').try_fold(&self.root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn require_str(&self, path: &str) -> Result<&str, ConfigError> {
        match self.get(path) {
            None => Err(ConfigError::MissingKey(path.to_string())),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ConfigError::InvalidValue {
                key: path.to_string(),
                detail: format!("expected a string, found {}", other),
            }),
        }
    }

    /// Deserializes the subtree at `path` into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self
            .get(path)
            .ok_or_else(|| ConfigError::MissingKey(path.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidValue {
            key: path.to_string(),
            detail: e.to_string(),
        })
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn tree() -> ConfigTree {
        ConfigTree::from_value(json!({
            "crisp": {
                "data_dir": "/var/crisp",
                "batch": 50,
                "topics": ["OrderRow", "order"],
                "stream": {"kind": "memory", "topic": "order"}
            }
        }))
    }

    #[test]
    fn dotted_paths_walk_maps_and_lists() {
        let tree = tree();
        assert_eq!(tree.get_str("crisp.data_dir"), Some("/var/crisp"));
        assert_eq!(tree.get("crisp.batch"), Some(&json!(50)));
        assert_eq!(tree.get_str("crisp.topics.1"), Some("order"));
        assert!(tree.get("crisp.topics.7").is_none());
        assert!(tree.get("crisp.data_dir.deeper").is_none());
        assert!(tree.contains("crisp.stream"));
    }

    #[test]
    fn require_str_reports_missing_and_mistyped_keys() {
        let tree = tree();
        assert!(matches!(tree.require_str("crisp.nope"), Err(ConfigError::MissingKey(k)) if k == "crisp.nope"));
        assert!(matches!(tree.require_str("crisp.batch"), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn get_as_deserializes_subtrees() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct StreamSection {
            kind: String,
            topic: String,
        }

        let tree = tree();
        let section: StreamSection = tree.get_as("crisp.stream").unwrap();
        assert_eq!(section.topic, "order");
        assert_eq!(tree.get_as::<u32>("crisp.batch").unwrap(), 50);
        assert!(matches!(tree.get_as::<u32>("crisp.data_dir"), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn default_tree_is_an_empty_map() {
        let tree = ConfigTree::default();
        assert_eq!(tree.root(), &json!({}));
        assert!(tree.get("anything").is_none());
    }
}
