//! Delivery log
//!
//! Keeps the most recent delivery attempts of both channels in memory together with
//! running metrics. Entries are capped by count and pruned by age.

use super::types::{
    ErrorTypeCount, ExportFormat, InstanceDeliveryStats, InstanceSuccessRate, WebhookLogEntry,
    WebhookMetrics, WebhookMetricsSummary,
};
use crate::config::models::webhook::WebhookLogConfig;
use crate::utils::bounded::{BoundedPush, tail};
use crate::utils::error::{RelayError, Result};
use crate::utils::task::PeriodicTask;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// How often expired entries are dropped
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<WebhookLogEntry>,
    metrics: WebhookMetrics,
    timed_responses: u64,
}

/// In-memory delivery log with metrics
#[derive(Debug)]
pub struct WebhookLogger {
    config: WebhookLogConfig,
    state: Mutex<LogState>,
    pruner: Mutex<Option<PeriodicTask>>,
}

impl WebhookLogger {
    pub fn new(config: WebhookLogConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LogState::default()),
            pruner: Mutex::new(None),
        }
    }

    /// Record one attempt
    pub fn record(&self, entry: WebhookLogEntry) {
        log_to_tracing(&entry);

        let mut state = self.state.lock();
        update_metrics(&mut state, &entry);
        state.entries.push_bounded(entry, self.config.max_entries);
    }

    pub fn metrics(&self) -> WebhookMetrics {
        self.state.lock().metrics.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest entries, oldest first
    pub fn recent(&self, limit: usize) -> Vec<WebhookLogEntry> {
        tail(&self.state.lock().entries, limit)
    }

    pub fn by_instance(&self, instance: &str, limit: usize) -> Vec<WebhookLogEntry> {
        let state = self.state.lock();
        let matching: VecDeque<WebhookLogEntry> = state
            .entries
            .iter()
            .filter(|entry| entry.instance.as_deref() == Some(instance))
            .cloned()
            .collect();
        tail(&matching, limit)
    }

    /// Failed attempts only
    pub fn errors(&self, limit: usize) -> Vec<WebhookLogEntry> {
        let state = self.state.lock();
        let failed: VecDeque<WebhookLogEntry> = state
            .entries
            .iter()
            .filter(|entry| entry.result.as_ref().is_some_and(|result| !result.success))
            .cloned()
            .collect();
        tail(&failed, limit)
    }

    pub fn summary(&self) -> WebhookMetricsSummary {
        let metrics = self.metrics();
        let percent = |part: u64| {
            if metrics.total > 0 {
                part as f64 / metrics.total as f64 * 100.0
            } else {
                0.0
            }
        };

        let mut top_errors: Vec<ErrorTypeCount> = metrics
            .errors_by_type
            .iter()
            .map(|(error_type, count)| ErrorTypeCount {
                error_type: error_type.clone(),
                count: *count,
            })
            .collect();
        top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.error_type.cmp(&b.error_type)));
        top_errors.truncate(5);

        let mut top_instances: Vec<InstanceSuccessRate> = metrics
            .instance_stats
            .iter()
            .map(|(instance, stats)| InstanceSuccessRate {
                instance: instance.clone(),
                total: stats.total,
                success_rate: if stats.total > 0 {
                    stats.successful as f64 / stats.total as f64 * 100.0
                } else {
                    0.0
                },
            })
            .collect();
        top_instances.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.instance.cmp(&b.instance)));
        top_instances.truncate(10);

        WebhookMetricsSummary {
            success_rate: percent(metrics.successful),
            error_rate: percent(metrics.failed),
            retry_rate: percent(metrics.retries),
            average_response_time_ms: metrics.average_response_time_ms,
            top_errors,
            top_instances,
        }
    }

    /// Serialize every retained entry
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        let (entries, metrics) = {
            let state = self.state.lock();
            (state.entries.iter().cloned().collect::<Vec<_>>(), state.metrics.clone())
        };

        match format {
            ExportFormat::Json => {
                let document = serde_json::json!({
                    "exportedAt": Utc::now().to_rfc3339(),
                    "totalLogs": entries.len(),
                    "metrics": metrics,
                    "logs": entries,
                });
                Ok(serde_json::to_string_pretty(&document)?)
            }
            ExportFormat::Csv => export_csv(&entries),
        }
    }

    /// Drop entries and metrics
    pub fn clear(&self) {
        *self.state.lock() = LogState::default();
        info!("Webhook logs and metrics cleared");
    }

    /// Drop entries recorded before `now - max_age`; returns how many went
    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::seconds(self.config.max_age_secs as i64);
        let cutoff = now - max_age;

        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.timestamp > cutoff);
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(removed, "Cleaned up old webhook logs");
        }
        removed
    }

    /// Start the age-based pruning loop
    pub fn start(self: &Arc<Self>) {
        let mut pruner = self.pruner.lock();
        if pruner.is_some() {
            return;
        }
        let logger = Arc::clone(self);
        *pruner = Some(PeriodicTask::spawn("webhook-log-pruner", PRUNE_INTERVAL, move || {
            let logger = Arc::clone(&logger);
            async move {
                logger.prune_expired_at(Utc::now());
            }
        }));
    }

    pub async fn stop(&self) {
        let pruner = self.pruner.lock().take();
        if let Some(task) = pruner {
            task.stop().await;
        }
    }
}

/// Bucket an error by status code first, then by its text
pub fn categorize_error(error: &str, status_code: Option<u16>) -> &'static str {
    match status_code {
        Some(code) if (400..500).contains(&code) => return "client_error",
        Some(code) if code >= 500 => return "server_error",
        _ => {}
    }

    let lower = error.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("dns") {
        "dns_error"
    } else if lower.contains("network") || lower.contains("connect") || lower.contains("econnreset") {
        "network_error"
    } else {
        "unknown_error"
    }
}

fn update_metrics(state: &mut LogState, entry: &WebhookLogEntry) {
    let metrics = &mut state.metrics;
    metrics.total += 1;

    if let Some(result) = &entry.result {
        if result.success {
            metrics.successful += 1;
        } else {
            metrics.failed += 1;
            if let Some(error) = &result.error {
                let category = categorize_error(error, result.status_code);
                *metrics.errors_by_type.entry(category.to_string()).or_insert(0) += 1;
            }
        }

        if entry.metadata.attempt.is_some_and(|attempt| attempt > 1) {
            metrics.retries += 1;
        }

        state.timed_responses += 1;
        let n = state.timed_responses as f64;
        metrics.average_response_time_ms += (result.response_time_ms as f64 - metrics.average_response_time_ms) / n;
    }

    if let Some(instance) = &entry.instance {
        let stats = metrics
            .instance_stats
            .entry(instance.clone())
            .or_insert_with(InstanceDeliveryStats::default);
        stats.total += 1;
        match entry.result.as_ref().map(|result| result.success) {
            Some(true) => stats.successful += 1,
            Some(false) => stats.failed += 1,
            None => {}
        }
    }
}

fn log_to_tracing(entry: &WebhookLogEntry) {
    let channel = entry.channel.as_str();
    let instance = entry.instance.as_deref().unwrap_or("-");
    match &entry.result {
        Some(result) if result.success => trace!(
            channel,
            event = %entry.event,
            instance,
            status = ?result.status_code,
            response_time_ms = result.response_time_ms,
            "Webhook delivered"
        ),
        Some(result) if entry.metadata.retry_scheduled => warn!(
            channel,
            event = %entry.event,
            instance,
            status = ?result.status_code,
            attempt = ?entry.metadata.attempt,
            error = ?result.error,
            "Webhook failed, retry scheduled"
        ),
        Some(result) => error!(
            channel,
            event = %entry.event,
            instance,
            status = ?result.status_code,
            attempt = ?entry.metadata.attempt,
            error = ?result.error,
            "Webhook failed"
        ),
        None => debug!(channel, event = %entry.event, instance, "Webhook sent"),
    }
}

fn export_csv(entries: &[WebhookLogEntry]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "timestamp",
        "type",
        "event",
        "instance",
        "success",
        "statusCode",
        "responseTime",
        "error",
        "attempt",
    ])?;

    for entry in entries {
        let result = entry.result.as_ref();
        writer.write_record([
            entry.timestamp.to_rfc3339(),
            entry.channel.as_str().to_string(),
            entry.event.clone(),
            entry.instance.clone().unwrap_or_default(),
            result.map(|r| r.success.to_string()).unwrap_or_default(),
            result
                .and_then(|r| r.status_code)
                .map(|code| code.to_string())
                .unwrap_or_default(),
            result.map(|r| r.response_time_ms.to_string()).unwrap_or_default(),
            result.and_then(|r| r.error.clone()).unwrap_or_default(),
            entry.metadata.attempt.map(|a| a.to_string()).unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| RelayError::internal(format!("Failed to flush CSV export: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| RelayError::internal(format!("CSV export is not UTF-8: {}", e)))
}
