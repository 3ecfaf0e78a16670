//! Webhook delivery configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Webhook delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    #[serde(default)]
    pub main: MainWebhookConfig,
    #[serde(default)]
    pub monitoring: MonitoringWebhookConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub log: WebhookLogConfig,
}

/// Primary channel carrying the message events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainWebhookConfig {
    /// Default target for subjects without their own entry
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_main_timeout_ms")]
    pub timeout_ms: u64,
    /// Headers sent with every main delivery
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-subject targets
    #[serde(default)]
    pub targets: HashMap<String, WebhookTarget>,
}

impl Default for MainWebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_main_timeout_ms(),
            headers: HashMap::new(),
            targets: HashMap::new(),
        }
    }
}

impl MainWebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A main-webhook endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebhookTarget {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Secondary channel carrying operational signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringWebhookConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_monitoring_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MonitoringWebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout_ms: default_monitoring_timeout_ms(),
        }
    }
}

impl MonitoringWebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The target URL when the channel is switched on
    pub fn active_url(&self) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

/// In-process retry policy for main deliveries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
    /// Interval of the background sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            retryable_status_codes: default_retryable_status_codes(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl RetryConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Delivery log retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookLogConfig {
    #[serde(default = "default_log_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_log_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for WebhookLogConfig {
    fn default() -> Self {
        Self {
            max_entries: default_log_max_entries(),
            max_age_secs: default_log_max_age_secs(),
        }
    }
}
