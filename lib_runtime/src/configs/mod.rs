//! # Configuration Modules
//!
//! The `ConfigTree` handed to service constructors, and, behind the `configs`
//! feature, its loader for templated YAML files.

/// Dotted-path lookups over a resolved configuration tree.
pub mod config_tree;

/// YAML loading with `$NAME` / `${NAME}` environment substitution.
#[cfg(feature = "configs")]
pub mod config_yaml;

use thiserror::Error;

pub use config_tree::ConfigTree;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Environment variable {0} is not present")]
    MissingEnvVar(String),

    #[error("Configuration key {0} is not present")]
    MissingKey(String),

    #[error("Configuration key {key} has an invalid value: {detail}")]
    InvalidValue { key: String, detail: String },
}
