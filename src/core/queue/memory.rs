//! Process-local broker

use super::broker::QueueBroker;
use super::types::{BrokerDelivery, DeadLetter, QueuedMessage};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct MemoryState {
    ready: VecDeque<QueuedMessage>,
    in_flight: HashMap<String, QueuedMessage>,
    dead: Vec<DeadLetter>,
    next_tag: u64,
}

/// Broker keeping everything in memory; contents survive `close` and a later `connect`
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<MemoryState>,
    notify: Notify,
    connected: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages diverted to the dead-letter list
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().dead.clone()
    }

    /// Deliveries handed out and not yet settled
    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RelayError::broker("in-memory broker is not connected"))
        }
    }

    fn take_ready(&self, max: usize) -> Vec<BrokerDelivery> {
        let mut state = self.state.lock();
        let count = max.min(state.ready.len());
        let mut deliveries = Vec::with_capacity(count);
        for _ in 0..count {
            let Some(message) = state.ready.pop_front() else {
                break;
            };
            state.next_tag += 1;
            let tag = state.next_tag.to_string();
            state.in_flight.insert(tag.clone(), message.clone());
            deliveries.push(BrokerDelivery { tag, message });
        }
        deliveries
    }

    fn settle(&self, delivery: &BrokerDelivery) -> Result<QueuedMessage> {
        self.state
            .lock()
            .in_flight
            .remove(&delivery.tag)
            .ok_or_else(|| RelayError::broker(format!("unknown delivery tag {}", delivery.tag)))
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        info!("In-memory broker connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn publish(&self, message: &QueuedMessage) -> Result<()> {
        self.ensure_connected()?;
        self.state.lock().ready.push_back(message.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn fetch(&self, max: usize, block: Duration) -> Result<Vec<BrokerDelivery>> {
        self.ensure_connected()?;

        let deliveries = self.take_ready(max);
        if !deliveries.is_empty() || block.is_zero() {
            return Ok(deliveries);
        }

        let _ = tokio::time::timeout(block, self.notify.notified()).await;
        self.ensure_connected()?;
        Ok(self.take_ready(max))
    }

    async fn ack(&self, delivery: &BrokerDelivery) -> Result<()> {
        self.settle(delivery)?;
        Ok(())
    }

    async fn requeue(&self, delivery: &BrokerDelivery, count_attempt: bool) -> Result<()> {
        let mut message = self.settle(delivery)?;
        if count_attempt {
            message.retry_count += 1;
        }
        self.state.lock().ready.push_back(message);
        self.notify.notify_one();
        Ok(())
    }

    async fn dead_letter(&self, delivery: &BrokerDelivery, reason: &str) -> Result<()> {
        let message = self.settle(delivery)?;
        warn!(message_id = %message.id, reason = %reason, "Message moved to dead-letter list");
        self.state.lock().dead.push(DeadLetter {
            message,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn depth(&self) -> Result<usize> {
        Ok(self.state.lock().ready.len())
    }

    async fn dead_letter_depth(&self) -> Result<usize> {
        Ok(self.state.lock().dead.len())
    }

    async fn purge(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let removed = state.ready.len();
        state.ready.clear();
        debug!(removed, "In-memory queue purged");
        Ok(removed)
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        // Unsettled deliveries go back to the front, as a broker would redeliver them
        let mut state = self.state.lock();
        let mut orphaned: Vec<(u64, QueuedMessage)> = state
            .in_flight
            .drain()
            .map(|(tag, message)| (tag.parse().unwrap_or(0), message))
            .collect();
        orphaned.sort_by_key(|(tag, _)| std::cmp::Reverse(*tag));
        for (_, message) in orphaned {
            state.ready.push_front(message);
        }
        drop(state);
        self.notify.notify_waiters();
        info!("In-memory broker closed");
        Ok(())
    }
}
