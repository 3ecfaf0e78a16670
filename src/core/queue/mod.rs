//! Durable at-least-once queue
//!
//! [`DurableQueue`] wraps a [`QueueBroker`] and owns the consume loop: every fetched
//! delivery ends in exactly one ack, requeue or dead-letter. Two brokers are provided,
//! Redis Streams (feature `redis`) and a process-local one.

mod adapter;
mod broker;
mod memory;
#[cfg(feature = "redis")]
mod redis_stream;
mod types;


pub use adapter::{ConsumerHandle, DurableQueue, MessageHandler};
pub use broker::QueueBroker;
pub use memory::InMemoryBroker;
#[cfg(feature = "redis")]
pub use redis_stream::RedisStreamBroker;
pub use types::{AudioMetadata, BrokerDelivery, DeadLetter, QueueMetrics, QueuedMessage};
