//! Roll-up of collector, queue, token bucket and retry figures

use super::collector::MetricsCollector;
use super::types::PipelineMetrics;
use crate::config::models::monitoring::HealthThresholds;
use crate::core::rate_limiter::TokenBucketStatus;
use crate::core::webhooks::RetryStats;
use crate::monitoring::health::{HealthInputs, assess};
use chrono::Utc;

/// State gathered from the other components at snapshot time
#[derive(Debug, Clone)]
pub struct SnapshotInputs {
    pub processor_running: bool,
    pub queue_size: usize,
    pub token_bucket: TokenBucketStatus,
    pub retry: RetryStats,
}

impl MetricsCollector {
    pub fn snapshot(&self, inputs: &SnapshotInputs, thresholds: &HealthThresholds) -> PipelineMetrics {
        let now = Utc::now();
        let daily = self.daily();
        let error_rate = self.error_rate();
        let average_processing_time_ms = self.average_processing_time_ms();

        let health = assess(
            &HealthInputs {
                processor_running: inputs.processor_running,
                queue_size: inputs.queue_size,
                error_rate,
                token_ratio: inputs.token_bucket.ratio(),
                average_processing_time_ms,
            },
            thresholds,
        );

        PipelineMetrics {
            queue_size: inputs.queue_size,
            is_processor_running: inputs.processor_running,
            processed_today: daily.processed,
            processed_this_hour: self.processed_this_hour(now),
            processed_this_minute: self.processed_this_minute(),
            average_processing_time_ms,
            throughput_per_minute: self.throughput_per_minute(),
            total_errors: daily.errors,
            error_rate,
            rate_limit_hits: daily.rate_limit_hits,
            rate_limit_hit_rate: self.rate_limit_hit_rate(),
            tokens_available: inputs.token_bucket.tokens,
            token_capacity: inputs.token_bucket.capacity,
            refill_rate: format!(
                "{}/{}ms",
                inputs.token_bucket.refill_rate, inputs.token_bucket.refill_interval_ms
            ),
            pending_retries: inputs.retry.pending,
            total_retry_attempts: inputs.retry.total_retry_attempts,
            average_retries_per_message: inputs.retry.average_attempts,
            last_processed_at: self.last_processed_at(),
            metrics_generated_at: now,
            health_status: health.status,
            health_issues: health.issues,
        }
    }
}
