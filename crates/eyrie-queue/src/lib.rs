//! # eyrie-queue
//!
//! A durable retry queue stored in SQLite. Producers `enqueue` opaque
//! payloads under a queue name; consumers `dequeue` the earliest due item
//! and decide, by returning a delay, whether it comes back for another try.
//! `listen` polls a queue on an interval until cancelled.

pub mod error;
pub mod queue;
pub mod schema;

pub use error::{QueueError, QueueResult};
pub use queue::RetryQueue;
