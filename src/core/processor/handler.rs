//! Per-message processing: admission, delivery and accounting

use crate::core::queue::{DurableQueue, MessageHandler, QueuedMessage};
use crate::core::rate_limiter::TokenBucket;
use crate::core::webhooks::{DeliveryService, WebhookEvent};
use crate::monitoring::MetricsCollector;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use serde_json::{Map, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Handles one dequeued message; an `Err` makes the queue requeue it
pub struct ProcessorCore {
    pub(super) bucket: Arc<TokenBucket>,
    pub(super) delivery: DeliveryService,
    pub(super) metrics: Arc<MetricsCollector>,
    pub(super) queue: DurableQueue,
}

impl ProcessorCore {
    async fn reject_for_rate_limit(&self, message: &QueuedMessage) -> RelayError {
        self.metrics.record_rate_limit_hit();
        let hits = self.metrics.daily().rate_limit_hits;
        warn!(message_id = %message.id, instance = %message.instance_name, "Rate limit exceeded");

        let stats = json!({
            "rateLimitHits": hits,
            "tokenBucket": self.bucket.status(),
        });
        self.delivery
            .send_rate_limit_exceeded(Some(&message.instance_name), Some(stats))
            .await;

        RelayError::rate_limit(format!("Rate limit exceeded for message {}", message.id))
    }

    async fn report_failure(&self, message: &QueuedMessage, error: &str) {
        self.metrics.record_error();
        error!(message_id = %message.id, instance = %message.instance_name, error, "Error processing message");

        let mut extra = Map::new();
        extra.insert("queueSize".to_string(), json!(self.queue.size().await));
        extra.insert("messageId".to_string(), json!(message.id));
        extra.insert("retryCount".to_string(), json!(message.retry_count));
        self.delivery
            .send_error(error, Some(&message.instance_name), Some(extra))
            .await;
    }
}

#[async_trait]
impl MessageHandler for ProcessorCore {
    async fn handle(&self, message: QueuedMessage) -> Result<()> {
        let started = Instant::now();

        if !self.bucket.consume(1) {
            return Err(self.reject_for_rate_limit(&message).await);
        }

        let event = WebhookEvent::message(message.instance_name.clone(), message.delivery_data());
        let target = self.delivery.main_target(&message.instance_name);
        let result = self.delivery.send_main(&event, target.as_ref()).await;

        if result.success {
            self.metrics.record_processed(started.elapsed());
            debug!(
                message_id = %message.id,
                instance = %message.instance_name,
                response_time_ms = result.response_time_ms,
                "Message delivered"
            );
            return Ok(());
        }

        let error = result.error_message().to_string();
        self.report_failure(&message, &error).await;
        Err(RelayError::delivery(error))
    }
}
