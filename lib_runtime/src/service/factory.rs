//! # Service Factory
//!
//! A static name → constructor table that lets a service be registered by a
//! textual identifier, e.g. read from a configuration file.
//!
//! Identifiers have the form `Kind` or `Kind[instance]`. The kind selects the
//! constructor; the instance name (which defaults to the kind) is passed to it,
//! typically to name the consumer the service subscribes with.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::error::ServiceError;
use super::Service;
use crate::configs::ConfigTree;

type Constructor =
    Box<dyn Fn(&str, &ConfigTree) -> Result<Arc<dyn Service>, ServiceError> + Send + Sync>;

pub struct ServiceFactory {
    config: ConfigTree,
    constructors: HashMap<String, Constructor>,
}

impl ServiceFactory {
    /// Creates an empty factory. `config` must be fully resolved: it is handed
    /// as-is to every constructor.
    pub fn new(config: ConfigTree) -> Self {
        Self {
            config,
            constructors: HashMap::new(),
        }
    }

    /// Adds (or replaces) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: &str, constructor: F) -> &mut Self
    where
        F: Fn(&str, &ConfigTree) -> Result<Arc<dyn Service>, ServiceError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.to_string(), Box::new(constructor));
        self
    }

    pub fn config(&self) -> &ConfigTree {
        &self.config
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Builds the service named by `identifier`.
    pub fn create(&self, identifier: &str) -> Result<Arc<dyn Service>, ServiceError> {
        let (kind, instance) = parse_identifier(identifier)?;
        let constructor = self.constructors.get(kind).ok_or_else(|| {
            ServiceError::InvalidArgument(format!("no service kind named '{}'", kind))
        })?;

        debug!("Constructing service {}[{}]", kind, instance);
        constructor(instance, &self.config)
    }
}

impl Default for ServiceFactory {
    fn default() -> Self {
        Self::new(ConfigTree::default())
    }
}

/// Splits `Kind[instance]` into its parts; a bare `Kind` is its own instance.
pub(crate) fn parse_identifier(identifier: &str) -> Result<(&str, &str), ServiceError> {
    let invalid = || {
        ServiceError::InvalidArgument(format!(
            "'{}' is not of the form 'Kind' or 'Kind[instance]'",
            identifier
        ))
    };

    let (kind, instance) = match identifier.split_once('[') {
        Some((kind, rest)) => {
            let instance = rest.strip_suffix(']').ok_or_else(invalid)?;
            (kind, instance)
        }
        None => (identifier, identifier),
    };

    let well_formed = |part: &str| !part.trim().is_empty() && !part.contains(['[', ']']);
    if !well_formed(kind) || !well_formed(instance) {
        return Err(invalid());
    }
    Ok((kind, instance))
}
