//! # In-Memory Backend
//!
//! The reference backend: single-process, memory-resident, non-durable.
//!
//! ## Components:
//!
//! - **`registry`**: `TopicRegistry`, the explicitly owned name → topic map.
//!   Streams receive it at construction; there is no process-wide singleton.
//! - **`topic`**: a topic's producer plus the subscriber set and id counter,
//!   guarded together by one lock.
//! - **`producer`**: zero-copy fan-out of each sent message to the live
//!   subscriber set.
//! - **`consumer`**: per-consumer FIFO buffer with a cancellable wait.
//! - **`memory_stream`**: the `Stream` handle tying the pieces together.
//!
//! Acknowledgments are accepted but not tracked, so there is no redelivery
//! after a consumer restart.

mod consumer;
mod memory_stream;
mod producer;
mod registry;
mod topic;

pub use consumer::MemoryConsumer;
pub use memory_stream::MemoryStream;
pub use producer::MemoryProducer;
pub use registry::TopicRegistry;
