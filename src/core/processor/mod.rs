//! Queue processor
//!
//! Pulls admitted events from the durable queue, gates them through the shared token
//! bucket and delivers them to the main webhook. Rate-limited and failed messages are
//! handed back to the queue as errors so it can requeue them.

mod handler;
mod processor;
mod types;

pub use handler::ProcessorCore;
pub use processor::QueueProcessor;
pub use types::{ProcessorState, ProcessorStats};
