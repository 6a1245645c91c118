//! Asynchronous batch pipeline: stages, chunking, queue, and orchestration
//!
//! Stage chaining is explicit: named stages consume and produce UUID sets,
//! connected through the `TaskQueue` enqueue/await primitive.

mod chunk;
mod orchestrator;
mod queue;
mod stages;

pub use chunk::{chunk_size, chunks};
pub use orchestrator::Orchestrator;
pub use queue::{DispatchError, LocalQueue, TaskHandle, TaskQueue, DEFAULT_QUEUE};
pub use stages::{Pipeline, PipelineError, Stage};
