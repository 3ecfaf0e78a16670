//! The relay facade
//!
//! [`Relay`] owns every pipeline component, runs their background tasks between
//! [`Relay::start`] and [`Relay::shutdown`], and routes inbound events:
//! filter, then the durable queue when it is running, otherwise direct delivery with
//! in-process retries.

mod admin;
mod types;

pub use types::{InboundEvent, IngestOutcome};

use crate::config::Config;
use crate::core::feedback::{FeedbackManager, FeedbackSender, HttpFeedbackSender, NoopFeedbackSender};
use crate::core::filter::{FilterDecision, FilterEngine, FilterStatsTracker};
use crate::core::processor::QueueProcessor;
use crate::core::queue::{DurableQueue, QueuedMessage};
use crate::core::rate_limiter::TokenBucket;
use crate::core::webhooks::{DeliveryService, RetryScheduler, WebhookEvent, WebhookLogger};
use crate::monitoring::MetricsCollector;
use crate::utils::error::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Event relay pipeline
pub struct Relay {
    config: Config,
    filter: FilterEngine,
    bucket: Arc<TokenBucket>,
    delivery: DeliveryService,
    retry: Arc<RetryScheduler>,
    metrics: Arc<MetricsCollector>,
    processor: Arc<QueueProcessor>,
    feedback: FeedbackManager,
}

impl Relay {
    /// Build every component, with the broker selected by the queue configuration
    pub fn new(config: Config) -> Result<Self> {
        let queue = DurableQueue::from_config(config.queue())?;
        Self::with_queue(config, queue)
    }

    /// Build every component around an existing queue
    pub fn with_queue(config: Config, queue: DurableQueue) -> Result<Self> {
        let relay = &config.relay;

        let filter_stats = Arc::new(FilterStatsTracker::new());
        let filter = FilterEngine::new(Arc::clone(&filter_stats), relay.audio_filter.clone());
        let bucket = Arc::new(TokenBucket::new(&relay.token_bucket));

        let logger = Arc::new(WebhookLogger::new(relay.webhook.log.clone()));
        let delivery = DeliveryService::new(
            relay.server.clone(),
            relay.webhook.main.clone(),
            relay.webhook.monitoring.clone(),
            logger,
        )?;
        let retry = Arc::new(RetryScheduler::new(delivery.clone(), relay.webhook.retry.clone()));
        let metrics = Arc::new(MetricsCollector::new());

        let processor = Arc::new(QueueProcessor::new(
            relay.queue.clone(),
            queue,
            Arc::clone(&bucket),
            delivery.clone(),
            Arc::clone(&metrics),
            filter_stats,
        ));

        let sender: Arc<dyn FeedbackSender> = match HttpFeedbackSender::from_config(&relay.feedback)? {
            Some(sender) => Arc::new(sender),
            None => Arc::new(NoopFeedbackSender),
        };
        let feedback = FeedbackManager::new(relay.feedback.clone(), sender);

        Ok(Self {
            config,
            filter,
            bucket,
            delivery,
            retry,
            metrics,
            processor,
            feedback,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start background tasks and, when enabled, queue consumption
    ///
    /// A broker that cannot be reached leaves the processor stopped; admitted events are
    /// then delivered directly.
    pub async fn start(&self) -> Result<()> {
        info!("Starting relay");
        self.delivery.logger().start();
        self.metrics.start();
        self.retry.start();

        if self.config.queue().enabled {
            match self.processor.initialize().await {
                Ok(()) => self.processor.start().await?,
                Err(e) => {
                    warn!(error = %e, "Queue unavailable, admitted events will be delivered directly");
                }
            }
        }

        info!(
            queue_running = self.processor.is_running(),
            monitoring = self.delivery.monitoring_enabled(),
            "Relay started"
        );
        Ok(())
    }

    /// Stop every background task; the consumer goes down before the broker closes
    pub async fn shutdown(&self) {
        info!("Shutting down relay");
        self.processor.stop().await;
        self.retry.stop().await;
        self.delivery.logger().stop().await;
        self.metrics.stop().await;
        self.feedback.shutdown().await;
        info!("Relay stopped");
    }

    /// Filter an inbound event and route it onward
    pub async fn ingest(&self, inbound: InboundEvent) -> IngestOutcome {
        let filter = inbound.filter.unwrap_or_default();
        let decision = self.filter.decide(&inbound.event, &filter, &inbound.instance);
        if !decision.allowed {
            self.report_filtered(&decision).await;
            return IngestOutcome::Filtered(decision);
        }

        let mut message = QueuedMessage::new(inbound.instance, inbound.event);
        if let Some(audio) = inbound.audio {
            message = message.with_audio_metadata(audio);
        }

        if self.processor.is_running() {
            if self.processor.enqueue(&message).await {
                debug!(message_id = %message.id, instance = %message.instance_name, "Event enqueued");
                return IngestOutcome::Enqueued { id: message.id };
            }
            warn!(message_id = %message.id, "Publish failed, delivering directly");
        }

        let started = Instant::now();
        let event = WebhookEvent::message(message.instance_name.clone(), message.delivery_data());
        let target = self.delivery.main_target(&message.instance_name);
        let result = self.retry.send_with_retry(event, target).await;
        if result.success {
            self.metrics.record_processed(started.elapsed());
        } else {
            self.metrics.record_error();
        }
        IngestOutcome::Delivered(result)
    }

    async fn report_filtered(&self, decision: &FilterDecision) {
        let filter_type = decision.filter_type.as_deref().unwrap_or("unknown");
        let value = match decision.duration_verdict() {
            Some(verdict) => json!({
                "reason": verdict,
                "detail": decision.reason,
            }),
            None => json!({
                "reason": decision.reason,
                "messageKind": decision.message_kind,
            }),
        };
        self.delivery
            .send_filter_applied(&decision.subject, filter_type, value)
            .await;
    }
}
