//! Validators for the relay configuration sections

use super::trait_def::Validate;
use super::endpoint::validate_http_url;
use crate::config::models::*;
use tracing::debug;

impl Validate for RelayConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating relay configuration");

        self.server.validate()?;
        self.queue.validate()?;
        self.token_bucket.validate()?;
        self.webhook.validate()?;
        self.audio_filter.validate()?;
        self.health.validate()?;
        self.feedback.validate()?;

        debug!("Relay configuration validation completed");
        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Server url cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Validate for QueueConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.backend == QueueBackend::Redis {
            if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://")
            {
                return Err(format!(
                    "Queue redis_url must start with redis:// or rediss://, got: {}",
                    self.redis_url
                ));
            }
            if !cfg!(feature = "redis") {
                return Err("Queue backend 'redis' requires the redis feature".to_string());
            }
        }

        if self.stream.is_empty() || self.consumer_group.is_empty() {
            return Err("Queue stream and consumer_group cannot be empty".to_string());
        }
        if self.stream == self.dead_letter_stream {
            return Err("Dead-letter stream must differ from the main stream".to_string());
        }
        if self.batch_size == 0 {
            return Err("Queue batch_size must be greater than 0".to_string());
        }
        if self.connect_timeout_ms == 0 || self.operation_timeout_ms == 0 {
            return Err("Queue timeouts must be greater than 0".to_string());
        }
        if self.stats_interval_secs == 0 {
            return Err("Queue stats_interval_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for TokenBucketConfig {
    fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("Token bucket capacity must be greater than 0".to_string());
        }
        if self.refill_rate == 0 {
            return Err("Token bucket refill_rate must be greater than 0".to_string());
        }
        if self.refill_interval_ms == 0 {
            return Err("Token bucket refill_interval_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for WebhookConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(url) = &self.main.url {
            validate_http_url(url, "Main webhook")?;
        }
        for (subject, target) in &self.main.targets {
            validate_http_url(&target.url, &format!("Main webhook target '{}'", subject))?;
        }
        if self.main.timeout_ms == 0 {
            return Err("Main webhook timeout_ms must be greater than 0".to_string());
        }

        if self.monitoring.enabled {
            match &self.monitoring.url {
                Some(url) => validate_http_url(url, "Monitoring webhook")?,
                None => return Err("Monitoring webhook is enabled but has no url".to_string()),
            }
        }
        if self.monitoring.timeout_ms == 0 {
            return Err("Monitoring webhook timeout_ms must be greater than 0".to_string());
        }

        self.retry.validate()?;

        if self.log.max_entries == 0 {
            return Err("Webhook log max_entries must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.backoff_factor < 1.0 {
            return Err("Retry backoff_factor must be at least 1.0".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("Retry base_delay_ms cannot exceed max_delay_ms".to_string());
        }
        if self.sweep_interval_ms == 0 {
            return Err("Retry sweep_interval_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for AudioFilterConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.max_duration_secs.is_finite() || self.max_duration_secs <= 0.0 {
            return Err("Audio filter max_duration_secs must be positive".to_string());
        }
        if self.regex_cache_size == 0 {
            return Err("Audio filter regex_cache_size must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for HealthThresholds {
    fn validate(&self) -> Result<(), String> {
        if self.queue_warning > self.queue_critical {
            return Err("Health queue_warning cannot exceed queue_critical".to_string());
        }
        if self.error_rate_warning > self.error_rate_critical {
            return Err("Health error_rate_warning cannot exceed error_rate_critical".to_string());
        }
        if !(0.0..=1.0).contains(&self.token_ratio_warning) {
            return Err("Health token_ratio_warning must be between 0 and 1".to_string());
        }
        Ok(())
    }
}

impl Validate for FeedbackConfig {
    fn validate(&self) -> Result<(), String> {
        if self.progress_indicators.is_empty() {
            return Err("Feedback needs at least one progress indicator".to_string());
        }
        if self.loop_interval_ms == 0 || self.timeout_secs == 0 {
            return Err("Feedback loop_interval_ms and timeout_secs must be greater than 0".to_string());
        }
        if let Some(url) = &self.outbound_url {
            validate_http_url(url, "Feedback outbound")?;
        }
        Ok(())
    }
}
