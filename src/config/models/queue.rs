//! Durable queue configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker backing the durable queue
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueBackend {
    /// Redis Streams with a consumer group
    #[default]
    Redis,
    /// Process-local broker
    Memory,
}

/// Durable queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Route admitted events through the queue
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: QueueBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_stream")]
    pub stream: String,
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,
    #[serde(default = "default_dead_letter_stream")]
    pub dead_letter_stream: String,
    /// Failed deliveries allowed before dead-lettering
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
    /// Approximate stream length cap
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Idle time after which another consumer's pending entries are reclaimed
    #[serde(default = "default_claim_idle_ms")]
    pub claim_idle_ms: u64,
    /// Pause after an admission rejection
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: QueueBackend::default(),
            redis_url: default_redis_url(),
            stream: default_stream(),
            consumer_group: default_consumer_group(),
            consumer_name: default_consumer_name(),
            dead_letter_stream: default_dead_letter_stream(),
            max_redeliveries: default_max_redeliveries(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
            block_timeout_ms: default_block_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            claim_idle_ms: default_claim_idle_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl QueueConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}
