//! Queue adapter: publish, consume loop and settlement

use super::broker::QueueBroker;
use super::memory::InMemoryBroker;
use super::types::{BrokerDelivery, QueueMetrics, QueuedMessage};
use crate::config::models::queue::{QueueBackend, QueueConfig};
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a failed fetch before polling the broker again
const FETCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Processes one dequeued message; an `Err` or a panic requeues it
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: QueuedMessage) -> Result<()>;
}

#[derive(Debug, Default)]
struct QueueCounters {
    published: AtomicU64,
    consumed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Durable queue over a pluggable broker
#[derive(Clone)]
pub struct DurableQueue {
    broker: Arc<dyn QueueBroker>,
    config: QueueConfig,
    counters: Arc<QueueCounters>,
}

/// Running consume loop
pub struct ConsumerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop fetching and wait for the message in hand to be settled
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!("Queue consumer task failed: {}", e);
        }
    }
}

impl DurableQueue {
    pub fn new(broker: Arc<dyn QueueBroker>, config: QueueConfig) -> Self {
        Self {
            broker,
            config,
            counters: Arc::new(QueueCounters::default()),
        }
    }

    /// Build the broker selected by `config.backend`
    pub fn from_config(config: &QueueConfig) -> Result<Self> {
        let broker: Arc<dyn QueueBroker> = match config.backend {
            QueueBackend::Memory => Arc::new(InMemoryBroker::new()),
            #[cfg(feature = "redis")]
            QueueBackend::Redis => Arc::new(super::redis_stream::RedisStreamBroker::new(config.clone())),
            #[cfg(not(feature = "redis"))]
            QueueBackend::Redis => {
                return Err(RelayError::config(
                    "queue backend 'redis' requires the redis feature",
                ));
            }
        };
        Ok(Self::new(broker, config.clone()))
    }

    pub fn broker(&self) -> &Arc<dyn QueueBroker> {
        &self.broker
    }

    pub async fn connect(&self) -> Result<()> {
        match tokio::time::timeout(self.config.connect_timeout(), self.broker.connect()).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::timeout(format!(
                "{} broker connect exceeded {}ms",
                self.broker.name(),
                self.config.connect_timeout_ms
            ))),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.broker.is_connected()
    }

    /// Returns false instead of failing so callers can fall back
    pub async fn publish(&self, message: &QueuedMessage) -> bool {
        if !self.broker.is_connected() {
            error!(message_id = %message.id, "Queue broker not connected, publish refused");
            return false;
        }

        let published =
            tokio::time::timeout(self.config.operation_timeout(), self.broker.publish(message)).await;
        match published {
            Ok(Ok(())) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                debug!(message_id = %message.id, instance = %message.instance_name, "Message published");
                true
            }
            Ok(Err(e)) => {
                warn!(message_id = %message.id, error = %e, "Failed to publish message");
                false
            }
            Err(_) => {
                warn!(message_id = %message.id, "Publish timed out");
                false
            }
        }
    }

    /// Start the consume loop; `handler` sees each message until it is acked or dead-lettered
    pub fn consume(&self, handler: Arc<dyn MessageHandler>) -> Result<ConsumerHandle> {
        if !self.broker.is_connected() {
            return Err(RelayError::broker("cannot consume: broker not connected"));
        }

        let cancel = CancellationToken::new();
        let queue = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { queue.consume_loop(handler, token).await });

        info!(backend = self.broker.name(), "Queue consumer started");
        Ok(ConsumerHandle { cancel, task })
    }

    async fn consume_loop(&self, handler: Arc<dyn MessageHandler>, cancel: CancellationToken) {
        // An in-flight fetch is never dropped, so nothing is left delivered but unseen
        while !cancel.is_cancelled() {
            let fetched = self
                .broker
                .fetch(self.config.batch_size, self.config.block_timeout())
                .await;

            let batch = match fetched {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "Queue fetch failed");
                    if sleep_or_cancel(FETCH_ERROR_BACKOFF, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            let mut pending = batch.into_iter();
            while let Some(delivery) = pending.next() {
                if cancel.is_cancelled() {
                    self.release(delivery).await;
                    continue;
                }

                let throttled = self.process(&handler, delivery).await;
                if throttled {
                    for rest in pending.by_ref() {
                        self.release(rest).await;
                    }
                    if sleep_or_cancel(self.config.rate_limit_backoff(), &cancel).await {
                        break;
                    }
                }
            }
        }
        info!("Queue consumer stopped");
    }

    /// Run the handler and settle the delivery; returns true on an admission rejection
    async fn process(&self, handler: &Arc<dyn MessageHandler>, delivery: BrokerDelivery) -> bool {
        self.counters.consumed.fetch_add(1, Ordering::Relaxed);
        debug!(message_id = %delivery.message.id, "Processing message from queue");

        let outcome = AssertUnwindSafe(handler.handle(delivery.message.clone()))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(RelayError::internal("message handler panicked")),
        };

        match failure {
            None => {
                if let Err(e) = self.broker.ack(&delivery).await {
                    error!(message_id = %delivery.message.id, error = %e, "Failed to ack message");
                }
                false
            }
            Some(e) => self.nack(&delivery, e).await,
        }
    }

    async fn nack(&self, delivery: &BrokerDelivery, failure: RelayError) -> bool {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let message = &delivery.message;

        if failure.is_admission_rejection() {
            debug!(message_id = %message.id, "Admission rejected, requeueing");
            if let Err(e) = self.broker.requeue(delivery, false).await {
                error!(message_id = %message.id, error = %e, "Failed to requeue message");
            }
            self.counters.retried.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        if message.retry_count >= self.config.max_redeliveries {
            warn!(
                message_id = %message.id,
                attempts = message.retry_count + 1,
                error = %failure,
                "Redeliveries exhausted, dead-lettering message"
            );
            match self.broker.dead_letter(delivery, &failure.to_string()).await {
                Ok(()) => {
                    self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => error!(message_id = %message.id, error = %e, "Failed to dead-letter message"),
            }
            return false;
        }

        warn!(
            message_id = %message.id,
            retry_count = message.retry_count + 1,
            error = %failure,
            "Message processing failed, requeueing"
        );
        match self.broker.requeue(delivery, true).await {
            Ok(()) => {
                self.counters.retried.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => error!(message_id = %message.id, error = %e, "Failed to requeue message"),
        }
        false
    }

    /// Hand an unprocessed delivery back without counting an attempt
    async fn release(&self, delivery: BrokerDelivery) {
        if let Err(e) = self.broker.requeue(&delivery, false).await {
            error!(message_id = %delivery.message.id, error = %e, "Failed to release message");
        }
    }

    /// Waiting messages; 0 when the broker cannot be asked
    pub async fn size(&self) -> usize {
        match tokio::time::timeout(self.config.operation_timeout(), self.broker.depth()).await {
            Ok(Ok(depth)) => depth,
            Ok(Err(e)) => {
                warn!(error = %e, "Error getting queue size");
                0
            }
            Err(_) => {
                warn!("Queue size query timed out");
                0
            }
        }
    }

    pub async fn dead_letter_size(&self) -> usize {
        match tokio::time::timeout(self.config.operation_timeout(), self.broker.dead_letter_depth()).await {
            Ok(Ok(depth)) => depth,
            _ => 0,
        }
    }

    pub async fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            message_count: self.size().await,
            dead_letter_count: self.dead_letter_size().await,
            published: self.counters.published.load(Ordering::Relaxed),
            consumed: self.counters.consumed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            dead_lettered: self.counters.dead_lettered.load(Ordering::Relaxed),
            connected: self.broker.is_connected(),
        }
    }

    pub async fn purge(&self) -> Result<usize> {
        let removed = self.broker.purge().await?;
        info!(removed, "Queue purged");
        Ok(removed)
    }

    pub async fn close(&self) {
        match tokio::time::timeout(self.config.operation_timeout(), self.broker.close()).await {
            Ok(Ok(())) => info!(backend = self.broker.name(), "Queue closed"),
            Ok(Err(e)) => error!(error = %e, "Error closing queue"),
            Err(_) => error!("Closing queue timed out"),
        }
    }
}

/// Sleep unless cancelled first; true when cancelled
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
