//! Broker abstraction

use super::types::{BrokerDelivery, QueuedMessage};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Minimal broker surface the queue adapter needs
///
/// Deliveries handed out by `fetch` stay pending until exactly one of `ack`,
/// `requeue` or `dead_letter` is called with them.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    async fn connect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn publish(&self, message: &QueuedMessage) -> Result<()>;

    /// Up to `max` deliveries, waiting at most `block` when nothing is ready
    async fn fetch(&self, max: usize, block: Duration) -> Result<Vec<BrokerDelivery>>;

    async fn ack(&self, delivery: &BrokerDelivery) -> Result<()>;

    /// Put the message back; `count_attempt` bumps its retry count
    async fn requeue(&self, delivery: &BrokerDelivery, count_attempt: bool) -> Result<()>;

    async fn dead_letter(&self, delivery: &BrokerDelivery, reason: &str) -> Result<()>;

    /// Messages waiting for delivery
    async fn depth(&self) -> Result<usize>;

    async fn dead_letter_depth(&self) -> Result<usize>;

    /// Drop every waiting message, returning how many were removed
    async fn purge(&self) -> Result<usize>;

    async fn close(&self) -> Result<()>;
}
