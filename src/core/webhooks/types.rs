//! Webhook type definitions
//!
//! Payloads for both channels, delivery results, delivery-log records and the state of
//! deliveries waiting for an in-process retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Event name of relayed messages
pub const MESSAGE_EVENT: &str = "messages.upsert";

/// A main-channel event before enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub instance: String,
    pub data: Value,
}

impl WebhookEvent {
    pub fn new(event: impl Into<String>, instance: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            instance: instance.into(),
            data,
        }
    }

    /// A relayed message event
    pub fn message(instance: impl Into<String>, data: Value) -> Self {
        Self::new(MESSAGE_EVENT, instance, data)
    }
}

/// Body POSTed to the main webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainWebhookPayload {
    pub event: String,
    pub instance: String,
    pub data: Value,
    pub server_url: String,
    pub apikey: Option<String>,
    pub timestamp: String,
}

/// Operational signals carried by the monitoring channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitoringEvent {
    #[serde(rename = "queue.error")]
    QueueError,
    #[serde(rename = "queue.stats")]
    QueueStats,
    #[serde(rename = "filter.applied")]
    FilterApplied,
    #[serde(rename = "rate_limit.exceeded")]
    RateLimitExceeded,
    #[serde(rename = "webhook.failed")]
    WebhookFailed,
}

impl MonitoringEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueError => "queue.error",
            Self::QueueStats => "queue.stats",
            Self::FilterApplied => "filter.applied",
            Self::RateLimitExceeded => "rate_limit.exceeded",
            Self::WebhookFailed => "webhook.failed",
        }
    }
}

impl fmt::Display for MonitoringEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitoring event before enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringSignal {
    pub event: MonitoringEvent,
    pub instance: Option<String>,
    pub data: Map<String, Value>,
}

impl MonitoringSignal {
    pub fn new(event: MonitoringEvent) -> Self {
        Self {
            event,
            instance: None,
            data: Map::new(),
        }
    }

    pub fn instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn maybe_instance(mut self, instance: Option<&str>) -> Self {
        self.instance = instance.map(str::to_string);
        self
    }

    /// Set a data field; `null` values are left out
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.data.insert(key.to_string(), value);
        }
        self
    }

    /// Merge every key of a JSON object into the data
    pub fn extend(mut self, extra: Map<String, Value>) -> Self {
        for (key, value) in extra {
            self.data.insert(key, value);
        }
        self
    }
}

/// Body POSTed to the monitoring webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringPayload {
    pub event: MonitoringEvent,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub data: Map<String, Value>,
    pub server_url: String,
}

/// Why a delivery failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum DeliveryFailure {
    /// No target URL for the subject
    NotConfigured,
    /// Connection, DNS or body errors
    Network,
    Timeout,
    /// Non-2xx response
    Status(u16),
}

/// Outcome of one delivery attempt; never an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<DeliveryFailure>,
}

impl WebhookResult {
    pub fn delivered(status_code: u16, response_time_ms: u64) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            response_time_ms,
            error: None,
            failure: None,
        }
    }

    pub fn failed(failure: DeliveryFailure, error: impl Into<String>, response_time_ms: u64) -> Self {
        let status_code = match failure {
            DeliveryFailure::Status(code) => Some(code),
            _ => None,
        };
        Self {
            success: false,
            status_code,
            response_time_ms,
            error: Some(error.into()),
            failure: Some(failure),
        }
    }

    /// Success without a request, for a channel that is switched off
    pub fn skipped() -> Self {
        Self {
            success: true,
            status_code: None,
            response_time_ms: 0,
            error: None,
            failure: None,
        }
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// Delivery channel of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookChannel {
    Main,
    Monitoring,
}

impl WebhookChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Monitoring => "monitoring",
        }
    }
}

/// Result part of a log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl From<&WebhookResult> for LoggedResult {
    fn from(result: &WebhookResult) -> Self {
        Self {
            success: result.success,
            status_code: result.status_code,
            response_time_ms: result.response_time_ms,
            error: result.error.clone(),
        }
    }
}

/// Retry bookkeeping attached to a log entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMetadata {
    pub attempt: Option<u32>,
    pub max_retries: Option<u32>,
    pub retry_scheduled: bool,
}

/// One delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogEntry {
    pub timestamp: DateTime<Utc>,
    pub channel: WebhookChannel,
    pub event: String,
    pub instance: Option<String>,
    pub webhook_url: Option<String>,
    /// Truncated JSON of the payload
    pub payload_summary: Option<String>,
    pub result: Option<LoggedResult>,
    #[serde(default)]
    pub metadata: LogMetadata,
}

/// Per-subject delivery counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceDeliveryStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

/// Running delivery-log metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub retries: u64,
    pub average_response_time_ms: f64,
    pub errors_by_type: HashMap<String, u64>,
    pub instance_stats: HashMap<String, InstanceDeliveryStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTypeCount {
    pub error_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSuccessRate {
    pub instance: String,
    pub total: u64,
    pub success_rate: f64,
}

/// Rates in percent of all logged attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMetricsSummary {
    pub success_rate: f64,
    pub error_rate: f64,
    pub retry_rate: f64,
    pub average_response_time_ms: f64,
    /// At most 5, most frequent first
    pub top_errors: Vec<ErrorTypeCount>,
    /// At most 10, busiest first
    pub top_instances: Vec<InstanceSuccessRate>,
}

/// Delivery-log export format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// A main delivery waiting for an in-process retry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedWebhook {
    pub id: String,
    pub event: WebhookEvent,
    pub url: String,
    #[serde(skip)]
    pub headers: HashMap<String, String>,
    /// Failed attempts so far
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
    pub next_retry: DateTime<Utc>,
    pub last_error: Option<String>,
    pub last_status_code: Option<u16>,
    #[serde(skip)]
    pub(super) due: tokio::time::Instant,
}

/// What a retry sweep did with one entry
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// Delivered on attempt `attempts`
    Delivered { id: String, attempts: u32 },
    Rescheduled { id: String, attempts: u32 },
    /// Dropped after its last allowed attempt
    Exhausted { id: String, attempts: u32 },
}

/// In-process retry statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub pending: usize,
    pub average_attempts: f64,
    /// Retries performed by the sweep
    pub total_retry_attempts: u64,
    pub permanently_failed: u64,
}
