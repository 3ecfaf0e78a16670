//! Webhook delivery
//!
//! - [`DeliveryService`]: main and monitoring channels
//! - [`RetryScheduler`]: in-process retries of failed main deliveries
//! - [`WebhookLogger`]: bounded log of every attempt

mod delivery;
mod logger;
mod retry;
#[cfg(test)]
mod tests;
mod types;

pub use delivery::DeliveryService;
pub use logger::{WebhookLogger, categorize_error};
pub use retry::RetryScheduler;
pub use types::{
    DeliveryFailure, ErrorTypeCount, ExportFormat, FailedWebhook, InstanceDeliveryStats,
    InstanceSuccessRate, LogMetadata, LoggedResult, MESSAGE_EVENT, MainWebhookPayload,
    MonitoringEvent, MonitoringPayload, MonitoringSignal, RetryOutcome, RetryStats,
    WebhookChannel, WebhookEvent, WebhookLogEntry, WebhookMetrics, WebhookMetricsSummary,
    WebhookResult,
};
