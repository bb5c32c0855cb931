//! # lib_runtime
//!
//! A lightweight in-process messaging runtime made of two halves:
//!
//! - **`service`**: the `Service` contract for long-running asynchronous units of
//!   work and the `ServiceManager` that runs a group of them concurrently and
//!   supervises the group as a single failure domain.
//! - **`stream`**: topic-based publish/subscribe (`Stream`, `Producer`,
//!   `Consumer`, `Message`, `Schema`) with an in-memory reference backend.
//!
//! The `configs` module always provides the `ConfigTree` handed to service
//! constructors; loading it from templated YAML needs the `configs` feature.
//! Subscriber setup lives behind the `loggers` feature.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod configs;
pub mod service;
pub mod stream;

#[cfg(feature = "loggers")]
pub mod loggers;

pub use service::{
    Service, ServiceContext, ServiceError, ServiceFactory, ServiceManager, ServiceSpec,
    StopHandle,
};
pub use stream::{
    messages, open_stream, Consumer, ConsumerState, JsonSchema, MemoryStream, Message,
    Producer, Properties, Schema, Stream, StreamError, StreamKind, TopicRegistry,
};

pub use configs::{ConfigError, ConfigTree};
