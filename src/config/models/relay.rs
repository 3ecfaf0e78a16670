//! Top-level relay configuration

use super::*;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Main relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Server identity
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Durable queue configuration
    #[serde(default)]
    pub queue: QueueConfig,
    /// Admission control configuration
    #[serde(default)]
    pub token_bucket: TokenBucketConfig,
    /// Webhook delivery configuration
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Global audio filter limits
    #[serde(default)]
    pub audio_filter: AudioFilterConfig,
    /// Health thresholds
    #[serde(default)]
    pub health: HealthThresholds,
    /// Processing feedback configuration
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl RelayConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `RELAY_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RELAY_SERVER_URL") {
            debug!("Overriding server url from environment");
            self.server.url = url;
        }
        if let Ok(key) = std::env::var("RELAY_API_KEY") {
            self.server.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("RELAY_REDIS_URL") {
            self.queue.redis_url = url;
        }
        if let Ok(url) = std::env::var("RELAY_MAIN_WEBHOOK_URL") {
            self.webhook.main.url = Some(url);
        }
        if let Ok(url) = std::env::var("RELAY_MONITORING_WEBHOOK_URL") {
            self.webhook.monitoring.enabled = true;
            self.webhook.monitoring.url = Some(url);
        }
    }
}
