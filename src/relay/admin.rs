//! Query and administrative operations

use super::Relay;
use crate::core::feedback::{FeedbackManager, FeedbackStats, FinishRequest, SessionInfo, StartRequest};
use crate::core::filter::{FilterStats, FilterStatsReport};
use crate::core::processor::ProcessorStats;
use crate::core::queue::QueueMetrics;
use crate::core::rate_limiter::TokenBucketStatus;
use crate::core::webhooks::{
    ExportFormat, FailedWebhook, RetryStats, WebhookLogEntry, WebhookMetrics, WebhookMetricsSummary,
};
use crate::monitoring::metrics::SnapshotInputs;
use crate::monitoring::{HealthReport, PipelineMetrics};
use crate::utils::error::Result;
use std::collections::HashMap;
use tracing::info;

impl Relay {
    pub fn filter_stats(&self) -> HashMap<String, FilterStats> {
        self.filter.stats().all_stats()
    }

    pub fn filter_report(&self, subject: &str) -> FilterStatsReport {
        self.filter.stats().report(subject)
    }

    /// Reset one subject's counters, or all of them
    pub fn reset_filter_stats(&self, subject: Option<&str>) {
        self.filter.stats().reset(subject);
    }

    pub async fn queue_metrics(&self) -> QueueMetrics {
        self.processor.queue_metrics().await
    }

    pub async fn processor_stats(&self) -> ProcessorStats {
        self.processor.stats().await
    }

    /// Drop every message waiting in the queue
    pub async fn purge_queue(&self) -> Result<usize> {
        self.processor.queue().purge().await
    }

    /// Rolled-up pipeline figures with the health verdict
    pub async fn metrics(&self) -> PipelineMetrics {
        let inputs = SnapshotInputs {
            processor_running: self.processor.is_running(),
            queue_size: self.processor.queue_size().await,
            token_bucket: self.bucket.status(),
            retry: self.retry.stats(),
        };
        self.metrics.snapshot(&inputs, &self.config.relay.health)
    }

    pub async fn health(&self) -> HealthReport {
        let metrics = self.metrics().await;
        HealthReport {
            status: metrics.health_status,
            issues: metrics.health_issues,
        }
    }

    pub fn reset_daily_counters(&self) {
        self.metrics.reset();
        info!("Daily counters reset");
    }

    pub fn token_bucket_status(&self) -> TokenBucketStatus {
        self.bucket.status()
    }

    /// Refill the token bucket to capacity
    pub fn reset_token_bucket(&self) {
        self.bucket.reset();
        info!(capacity = self.bucket.capacity(), "Token bucket reset");
    }

    pub fn recent_deliveries(&self, limit: usize) -> Vec<WebhookLogEntry> {
        self.delivery.logger().recent(limit)
    }

    pub fn delivery_errors(&self, limit: usize) -> Vec<WebhookLogEntry> {
        self.delivery.logger().errors(limit)
    }

    pub fn deliveries_for(&self, instance: &str, limit: usize) -> Vec<WebhookLogEntry> {
        self.delivery.logger().by_instance(instance, limit)
    }

    pub fn delivery_metrics(&self) -> WebhookMetrics {
        self.delivery.logger().metrics()
    }

    pub fn delivery_summary(&self) -> WebhookMetricsSummary {
        self.delivery.logger().summary()
    }

    pub fn export_deliveries(&self, format: ExportFormat) -> Result<String> {
        self.delivery.logger().export(format)
    }

    pub fn clear_delivery_logs(&self) {
        self.delivery.logger().clear();
    }

    pub fn failed_webhooks(&self) -> Vec<FailedWebhook> {
        self.retry.failed_webhooks()
    }

    pub fn retry_stats(&self) -> RetryStats {
        self.retry.stats()
    }

    /// Drop one parked webhook; false when the id is unknown
    pub fn clear_failed_webhook(&self, id: &str) -> bool {
        self.retry.clear(id)
    }

    pub fn clear_failed_webhooks(&self) -> usize {
        self.retry.clear_all()
    }

    pub fn feedback(&self) -> &FeedbackManager {
        &self.feedback
    }

    pub fn start_feedback(&self, request: StartRequest) -> Result<String> {
        self.feedback.start(request)
    }

    pub async fn finish_feedback(&self, request: FinishRequest) -> Result<()> {
        self.feedback.finish(request).await
    }

    pub async fn force_cleanup_feedback(&self, session_id: &str) -> bool {
        self.feedback.force_cleanup(session_id).await
    }

    pub fn active_feedback_sessions(&self) -> Vec<SessionInfo> {
        self.feedback.active_sessions()
    }

    pub fn feedback_stats(&self) -> FeedbackStats {
        self.feedback.stats()
    }
}
