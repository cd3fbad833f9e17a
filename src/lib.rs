//! Single-producer, single-consumer bounded buffer guarded by a mutex and a
//! pair of counting semaphores.
//!
//! ```no_run
//! use std::sync::Arc;
//! use bounded_buffer::{config::Config, event::LogSink, pipeline};
//!
//! let report = pipeline::run(Config::default(), Arc::new(LogSink)).unwrap();
//! assert_eq!(report.consumed, 20);
//! ```

pub mod bounded_queue;
pub mod cancel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod event;
pub mod item;
pub mod logger;
mod pacing;
pub mod pipeline;
pub mod producer;
mod ring;
pub mod semaphore;
mod sync;

pub use bounded_queue::BoundedQueue;
pub use config::{Config, ProducerMode};
pub use error::{RunError, Role};
pub use pipeline::{Outcome, Pipeline, Report};
