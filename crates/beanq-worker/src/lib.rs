pub mod config;
pub mod enqueue;
pub mod error;
pub mod executor;
pub mod handler;
pub mod policy;
pub mod worker;

#[cfg(test)]
mod mock;

pub use config::WorkerConfig;
pub use enqueue::{EnqueueOptions, Enqueuer, PriorityOption};
pub use error::{EnqueueError, JobError, JobErrorKind, WorkerError};
pub use handler::{handler_fn, HandlerRegistry, HandlerResult, JobHandler};
pub use policy::ErrorPolicy;
pub use worker::{JobOutcome, Worker};
