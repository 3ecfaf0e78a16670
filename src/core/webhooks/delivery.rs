//! Dual-channel webhook delivery
//!
//! The main channel carries the relayed events, the monitoring channel carries
//! operational signals. Neither path returns an error: every send ends in a
//! [`WebhookResult`] that is also recorded in the delivery log.

use super::logger::WebhookLogger;
use super::types::{
    DeliveryFailure, LogMetadata, LoggedResult, MainWebhookPayload, MonitoringEvent,
    MonitoringPayload, MonitoringSignal, WebhookChannel, WebhookEvent, WebhookLogEntry,
    WebhookResult,
};
use crate::config::models::default_user_agent;
use crate::config::models::server::ServerConfig;
use crate::config::models::webhook::{MainWebhookConfig, MonitoringWebhookConfig, WebhookTarget};
use crate::utils::error::{RelayError, Result};
use crate::utils::truncate_string;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const PAYLOAD_SUMMARY_CHARS: usize = 200;

/// Sends to the main and monitoring webhooks
#[derive(Debug, Clone)]
pub struct DeliveryService {
    client: Client,
    server: ServerConfig,
    main: MainWebhookConfig,
    monitoring: MonitoringWebhookConfig,
    logger: Arc<WebhookLogger>,
    user_agent: String,
}

impl DeliveryService {
    pub fn new(
        server: ServerConfig,
        main: MainWebhookConfig,
        monitoring: MonitoringWebhookConfig,
        logger: Arc<WebhookLogger>,
    ) -> Result<Self> {
        // Per-request timeouts are set by each channel
        let client = Client::builder()
            .connect_timeout(main.timeout().min(monitoring.timeout()))
            .build()
            .map_err(|e| RelayError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server,
            main,
            monitoring,
            logger,
            user_agent: default_user_agent(),
        })
    }

    pub fn logger(&self) -> &Arc<WebhookLogger> {
        &self.logger
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.active_url().is_some()
    }

    /// Main-webhook target for a subject: its own entry, else the default URL
    pub fn main_target(&self, instance: &str) -> Option<WebhookTarget> {
        if let Some(target) = self.main.targets.get(instance) {
            if !target.url.is_empty() {
                let mut headers = self.main.headers.clone();
                headers.extend(target.headers.clone());
                return Some(WebhookTarget {
                    url: target.url.clone(),
                    headers,
                });
            }
        }

        self.main
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .map(|url| WebhookTarget {
                url: url.to_string(),
                headers: self.main.headers.clone(),
            })
    }

    /// Send one event to the main webhook as a first attempt
    pub async fn send_main(&self, event: &WebhookEvent, target: Option<&WebhookTarget>) -> WebhookResult {
        self.send_main_attempt(event, target, 1, None).await
    }

    /// Send one event to the main webhook; failures are reported on the monitoring channel
    pub async fn send_main_attempt(
        &self,
        event: &WebhookEvent,
        target: Option<&WebhookTarget>,
        attempt: u32,
        max_retries: Option<u32>,
    ) -> WebhookResult {
        let Some(target) = target else {
            warn!(instance = %event.instance, "No webhook URL configured for main webhook");
            let result = WebhookResult::failed(DeliveryFailure::NotConfigured, "No webhook URL configured", 0);
            self.log_attempt(WebhookChannel::Main, &event.event, Some(&event.instance), None, None, &result, attempt, max_retries);
            return result;
        };

        let payload = MainWebhookPayload {
            event: event.event.clone(),
            instance: event.instance.clone(),
            data: event.data.clone(),
            server_url: self.server.url.clone(),
            apikey: self.server.api_key.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        debug!(instance = %event.instance, url = %target.url, attempt, "Sending main webhook");
        let result = self
            .post(&target.url, &header_pairs(target), &payload, self.main.timeout())
            .await;

        let summary = serde_json::to_string(&event.data)
            .ok()
            .map(|s| truncate_string(&s, PAYLOAD_SUMMARY_CHARS));
        self.log_attempt(
            WebhookChannel::Main,
            &event.event,
            Some(&event.instance),
            Some(&target.url),
            summary,
            &result,
            attempt,
            max_retries,
        );

        if !result.success {
            let signal = MonitoringSignal::new(MonitoringEvent::WebhookFailed)
                .instance(event.instance.clone())
                .field("error", result.error_message())
                .field("webhookUrl", target.url.clone())
                .field("statusCode", result.status_code)
                .field("responseTime", result.response_time_ms);
            self.send_monitoring(signal).await;
        }

        result
    }

    /// Send a signal to the monitoring webhook; a no-op success when the channel is off
    pub async fn send_monitoring(&self, signal: MonitoringSignal) -> WebhookResult {
        let Some(url) = self.monitoring.active_url() else {
            return WebhookResult::skipped();
        };

        let payload = MonitoringPayload {
            event: signal.event,
            timestamp: chrono::Utc::now().to_rfc3339(),
            instance: signal.instance.clone(),
            data: signal.data,
            server_url: self.server.url.clone(),
        };

        let result = self.post(url, &[], &payload, self.monitoring.timeout()).await;
        if !result.success {
            warn!(
                event = %signal.event,
                error = result.error_message(),
                "Monitoring webhook failed"
            );
        }
        self.log_attempt(
            WebhookChannel::Monitoring,
            signal.event.as_str(),
            signal.instance.as_deref(),
            Some(url),
            None,
            &result,
            1,
            None,
        );
        result
    }

    pub async fn send_queue_stats(
        &self,
        queue_size: usize,
        processed_count: u64,
        audio_filter_stats: Option<Value>,
        rate_limit_stats: Option<Value>,
    ) -> WebhookResult {
        let signal = MonitoringSignal::new(MonitoringEvent::QueueStats)
            .field("queueSize", queue_size)
            .field("processedCount", processed_count)
            .field("audioFilterStats", audio_filter_stats)
            .field("rateLimitStats", rate_limit_stats);
        self.send_monitoring(signal).await
    }

    /// Report a blocked event; `value` describes the rule that fired
    pub async fn send_filter_applied(&self, instance: &str, filter_type: &str, value: Value) -> WebhookResult {
        let audio_filter_stats = if filter_type == "duration" {
            let reason = value.get("reason").and_then(Value::as_str).unwrap_or_default();
            Some(json!({
                "processed": 0,
                "tooShort": u8::from(reason == "tooShort"),
                "tooLong": u8::from(reason == "tooLong"),
            }))
        } else {
            None
        };

        let signal = MonitoringSignal::new(MonitoringEvent::FilterApplied)
            .instance(instance)
            .field("filteredCount", 1)
            .field("filterType", filter_type)
            .field("value", value)
            .field("audioFilterStats", audio_filter_stats);
        self.send_monitoring(signal).await
    }

    pub async fn send_rate_limit_exceeded(&self, instance: Option<&str>, rate_limit_stats: Option<Value>) -> WebhookResult {
        let signal = MonitoringSignal::new(MonitoringEvent::RateLimitExceeded)
            .maybe_instance(instance)
            .field("error", "Rate limit exceeded")
            .field("rateLimitStats", rate_limit_stats);
        self.send_monitoring(signal).await
    }

    /// Report a `queue.error`; keys of `extra` are merged into the data
    pub async fn send_error(&self, error: &str, instance: Option<&str>, extra: Option<Map<String, Value>>) -> WebhookResult {
        let signal = MonitoringSignal::new(MonitoringEvent::QueueError)
            .maybe_instance(instance)
            .field("error", error)
            .extend(extra.unwrap_or_default());
        self.send_monitoring(signal).await
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        payload: &T,
        timeout: Duration,
    ) -> WebhookResult {
        let start = Instant::now();

        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent);
        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.json(payload).send().await;
        let elapsed = start.elapsed().as_millis() as u64;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                if (200..300).contains(&status) {
                    WebhookResult::delivered(status, elapsed)
                } else {
                    let body = response.text().await.unwrap_or_default();
                    let error = if body.is_empty() {
                        format!("Webhook returned status {}", status)
                    } else {
                        format!("Webhook returned status {}: {}", status, truncate_string(&body, PAYLOAD_SUMMARY_CHARS))
                    };
                    WebhookResult::failed(DeliveryFailure::Status(status), error, elapsed)
                }
            }
            Err(e) if e.is_timeout() => WebhookResult::failed(
                DeliveryFailure::Timeout,
                format!("Request timeout after {}ms", timeout.as_millis()),
                elapsed,
            ),
            Err(e) => WebhookResult::failed(DeliveryFailure::Network, format!("Network error: {}", e), elapsed),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn log_attempt(
        &self,
        channel: WebhookChannel,
        event: &str,
        instance: Option<&str>,
        url: Option<&str>,
        payload_summary: Option<String>,
        result: &WebhookResult,
        attempt: u32,
        max_retries: Option<u32>,
    ) {
        self.logger.record(WebhookLogEntry {
            timestamp: chrono::Utc::now(),
            channel,
            event: event.to_string(),
            instance: instance.map(str::to_string),
            webhook_url: url.map(str::to_string),
            payload_summary,
            result: Some(LoggedResult::from(result)),
            metadata: LogMetadata {
                attempt: Some(attempt),
                max_retries,
                retry_scheduled: false,
            },
        });
    }
}

fn header_pairs(target: &WebhookTarget) -> Vec<(&str, &str)> {
    target
        .headers
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}
