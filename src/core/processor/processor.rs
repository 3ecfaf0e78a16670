//! Queue processor lifecycle
//!
//! Owns the consume loop and the periodic `queue.stats` emission. `stop` cancels
//! consumption and waits for the message in hand before closing the broker.

use super::handler::ProcessorCore;
use super::types::{ProcessorState, ProcessorStats};
use crate::config::models::queue::QueueConfig;
use crate::core::filter::FilterStatsTracker;
use crate::core::queue::{ConsumerHandle, DurableQueue, QueueMetrics, QueuedMessage};
use crate::core::rate_limiter::TokenBucket;
use crate::core::webhooks::DeliveryService;
use crate::monitoring::MetricsCollector;
use crate::utils::error::{RelayError, Result};
use crate::utils::task::PeriodicTask;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Consumes the durable queue through the token bucket into the main webhook
pub struct QueueProcessor {
    config: QueueConfig,
    queue: DurableQueue,
    core: Arc<ProcessorCore>,
    filter_stats: Arc<FilterStatsTracker>,
    state: Mutex<ProcessorState>,
    consumer: tokio::sync::Mutex<Option<ConsumerHandle>>,
    stats_task: Mutex<Option<PeriodicTask>>,
}

impl QueueProcessor {
    pub fn new(
        config: QueueConfig,
        queue: DurableQueue,
        bucket: Arc<TokenBucket>,
        delivery: DeliveryService,
        metrics: Arc<MetricsCollector>,
        filter_stats: Arc<FilterStatsTracker>,
    ) -> Self {
        let core = Arc::new(ProcessorCore {
            bucket,
            delivery,
            metrics,
            queue: queue.clone(),
        });
        Self {
            config,
            queue,
            core,
            filter_stats,
            state: Mutex::new(ProcessorState::Stopped),
            consumer: tokio::sync::Mutex::new(None),
            stats_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ProcessorState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessorState::Running
    }

    pub fn queue(&self) -> &DurableQueue {
        &self.queue
    }

    /// Connect to the broker
    pub async fn initialize(&self) -> Result<()> {
        if !self.config.enabled {
            warn!("Queue is disabled, processor not initialized");
            return Ok(());
        }

        {
            let mut state = self.state.lock();
            if *state != ProcessorState::Stopped {
                return Err(RelayError::conflict(format!(
                    "cannot initialize queue processor while {}",
                    *state
                )));
            }
            *state = ProcessorState::Initializing;
        }

        match self.queue.connect().await {
            Ok(()) => {
                info!("Queue processor initialized successfully");
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ProcessorState::Stopped;
                error!(error = %e, "Failed to initialize queue processor");
                Err(e)
            }
        }
    }

    /// Begin consuming and emitting periodic stats
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if !self.config.enabled {
            warn!("Cannot start processing: queue is disabled");
            return Ok(());
        }

        let mut consumer = self.consumer.lock().await;
        match self.state() {
            ProcessorState::Running => {
                warn!("Queue processor is already running");
                return Ok(());
            }
            ProcessorState::Initializing if self.queue.is_connected() => {}
            other => {
                return Err(RelayError::conflict(format!(
                    "cannot start queue processor while {}",
                    other
                )));
            }
        }

        let handler: Arc<dyn crate::core::queue::MessageHandler> = self.core.clone();
        *consumer = Some(self.queue.consume(handler)?);
        *self.state.lock() = ProcessorState::Running;

        let processor = Arc::clone(self);
        *self.stats_task.lock() = Some(PeriodicTask::spawn(
            "queue-stats",
            self.config.stats_interval(),
            move || {
                let processor = Arc::clone(&processor);
                async move { processor.emit_stats().await }
            },
        ));

        info!("Queue processor started");
        Ok(())
    }

    /// Stop consuming, then close the broker
    pub async fn stop(&self) {
        let consumer = self.consumer.lock().await.take();
        if let Some(consumer) = consumer {
            consumer.shutdown().await;
        }

        let stats_task = self.stats_task.lock().take();
        if let Some(task) = stats_task {
            task.stop().await;
        }

        let was = std::mem::replace(&mut *self.state.lock(), ProcessorState::Stopped);
        if was != ProcessorState::Stopped {
            self.queue.close().await;
            info!("Queue processor stopped");
        }
    }

    /// Publish for later delivery; false when the broker cannot take it
    pub async fn enqueue(&self, message: &QueuedMessage) -> bool {
        if !self.queue.is_connected() {
            error!(message_id = %message.id, "Queue not connected, cannot enqueue message");
            return false;
        }
        self.queue.publish(message).await
    }

    pub async fn stats(&self) -> ProcessorStats {
        let daily = self.core.metrics.daily();
        ProcessorStats {
            is_running: self.is_running(),
            state: self.state(),
            processed_today: daily.processed,
            rate_limit_hits: daily.rate_limit_hits,
            errors: daily.errors,
            last_processed_at: self.core.metrics.last_processed_at(),
            queue_size: self.queue.size().await,
            token_bucket_status: self.core.bucket.status(),
        }
    }

    pub async fn queue_size(&self) -> usize {
        self.queue.size().await
    }

    pub async fn queue_metrics(&self) -> QueueMetrics {
        self.queue.metrics().await
    }

    /// Send one `queue.stats` signal
    pub async fn emit_stats(&self) {
        let queue_size = self.queue.size().await;
        let processed = self.core.metrics.daily().processed;
        let audio_filter_stats = serde_json::to_value(self.filter_stats.all_stats()).ok();
        let rate_limit_stats = serde_json::to_value(self.core.bucket.status()).ok();

        self.core
            .delivery
            .send_queue_stats(queue_size, processed, audio_filter_stats, rate_limit_stats)
            .await;
    }
}
