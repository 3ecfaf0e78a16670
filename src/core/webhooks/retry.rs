//! In-process retry of failed main deliveries
//!
//! Retryable failures (no status code, or a status in the configured set) are parked in a
//! map keyed by subject, event and URL. A periodic sweep re-sends every entry that is due
//! and drops it once it succeeds or runs out of attempts.

use super::delivery::DeliveryService;
use super::types::{
    DeliveryFailure, FailedWebhook, MonitoringEvent, MonitoringSignal, RetryOutcome, RetryStats,
    WebhookEvent, WebhookResult,
};
use crate::config::models::webhook::{RetryConfig, WebhookTarget};
use crate::utils::task::PeriodicTask;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound of the random jitter, as a share of the exponential delay
const JITTER_RATIO: f64 = 0.1;

/// Bounded exponential-backoff retries outside the broker
#[derive(Debug)]
pub struct RetryScheduler {
    delivery: DeliveryService,
    config: RetryConfig,
    pending: Mutex<HashMap<String, FailedWebhook>>,
    /// Serializes sweeps so an entry is never re-sent twice at once
    sweep_lock: tokio::sync::Mutex<()>,
    retry_attempts: AtomicU64,
    permanently_failed: AtomicU64,
    sweeper: Mutex<Option<PeriodicTask>>,
}

impl RetryScheduler {
    pub fn new(delivery: DeliveryService, config: RetryConfig) -> Self {
        Self {
            delivery,
            config,
            pending: Mutex::new(HashMap::new()),
            sweep_lock: tokio::sync::Mutex::new(()),
            retry_attempts: AtomicU64::new(0),
            permanently_failed: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        }
    }

    pub fn delivery(&self) -> &DeliveryService {
        &self.delivery
    }

    /// First 16 hex chars of SHA-256 over `instance_event_url`
    pub fn webhook_id(instance: &str, event: &str, url: &str) -> String {
        let digest = Sha256::digest(format!("{}_{}_{}", instance, event, url).as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    /// Whether a failed main delivery may be attempted again
    pub fn should_retry(&self, result: &WebhookResult) -> bool {
        if result.success {
            return false;
        }
        match result.failure {
            Some(DeliveryFailure::NotConfigured) => false,
            Some(DeliveryFailure::Status(code)) => self.config.retryable_status_codes.contains(&code),
            Some(DeliveryFailure::Network) | Some(DeliveryFailure::Timeout) | None => true,
        }
    }

    /// `min(base * factor^(attempt-1) + jitter, max)`, jitter up to a tenth of the exponential term
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let exponential = self.config.base_delay_ms as f64 * self.config.backoff_factor.powi(exponent);
        let jitter = rand::thread_rng().r#gen::<f64>() * JITTER_RATIO * exponential;
        let capped = (exponential + jitter).min(self.config.max_delay_ms as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Deliver once and park the event for retry if the failure allows it
    pub async fn send_with_retry(&self, event: WebhookEvent, target: Option<WebhookTarget>) -> WebhookResult {
        let result = self
            .delivery
            .send_main_attempt(&event, target.as_ref(), 1, Some(self.config.max_retries))
            .await;

        if result.success {
            return result;
        }

        match target {
            Some(target) if self.should_retry(&result) => {
                let id = Self::webhook_id(&event.instance, &event.event, &target.url);
                self.schedule(&id, Some((event, target)), &result).await;
            }
            _ => {
                warn!(
                    instance = %event.instance,
                    error = result.error_message(),
                    "Main webhook failed permanently, not retrying"
                );
            }
        }
        result
    }

    /// Re-send every entry whose retry time has come
    pub async fn process_due(&self) -> Vec<RetryOutcome> {
        let _sweep = self.sweep_lock.lock().await;
        let now = tokio::time::Instant::now();

        let due: Vec<FailedWebhook> = self
            .pending
            .lock()
            .values()
            .filter(|entry| entry.due <= now)
            .cloned()
            .collect();

        let mut outcomes = Vec::with_capacity(due.len());
        for entry in due {
            outcomes.push(self.retry_entry(entry).await);
        }
        outcomes
    }

    async fn retry_entry(&self, entry: FailedWebhook) -> RetryOutcome {
        let attempt = entry.attempts + 1;
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
        info!(
            webhook_id = %entry.id,
            instance = %entry.event.instance,
            attempt,
            max_retries = self.config.max_retries,
            "Retrying webhook"
        );

        let target = WebhookTarget {
            url: entry.url.clone(),
            headers: entry.headers.clone(),
        };
        let result = self
            .delivery
            .send_main_attempt(&entry.event, Some(&target), attempt, Some(self.config.max_retries))
            .await;

        if result.success {
            self.pending.lock().remove(&entry.id);
            info!(webhook_id = %entry.id, attempt, "Webhook retry successful");
            let signal = MonitoringSignal::new(MonitoringEvent::QueueStats)
                .instance(entry.event.instance.clone())
                .field("processedCount", 1);
            self.delivery.send_monitoring(signal).await;
            return RetryOutcome::Delivered {
                id: entry.id,
                attempts: attempt,
            };
        }

        if !self.should_retry(&result) {
            self.pending.lock().remove(&entry.id);
            self.give_up(&entry.id, &entry.event.instance, attempt, &result).await;
            return RetryOutcome::Exhausted {
                id: entry.id,
                attempts: attempt,
            };
        }

        self.schedule(&entry.id, None, &result).await
    }

    /// Count a failure against `id`; `fresh` creates the entry when it is not parked yet
    async fn schedule(
        &self,
        id: &str,
        fresh: Option<(WebhookEvent, WebhookTarget)>,
        result: &WebhookResult,
    ) -> RetryOutcome {
        let now = chrono::Utc::now();

        let scheduled = {
            let mut pending = self.pending.lock();
            let attempts = match pending.get(id) {
                Some(existing) => existing.attempts + 1,
                None if fresh.is_some() => 1,
                // Cleared while the retry was in flight
                None => {
                    return RetryOutcome::Exhausted {
                        id: id.to_string(),
                        attempts: 0,
                    };
                }
            };

            if attempts > self.config.max_retries {
                let instance = pending
                    .remove(id)
                    .map(|entry| entry.event.instance)
                    .or_else(|| fresh.as_ref().map(|(event, _)| event.instance.clone()))
                    .unwrap_or_default();
                Err((attempts, instance))
            } else {
                let delay = self.retry_delay(attempts);
                let next_retry = now + chrono::Duration::milliseconds(delay.as_millis() as i64);
                let due = tokio::time::Instant::now() + delay;

                match pending.get_mut(id) {
                    Some(entry) => {
                        // Latest failed payload for the key wins
                        if let Some((event, target)) = fresh {
                            debug!(webhook_id = %id, "Replacing pending payload with newer failure");
                            entry.event = event;
                            entry.url = target.url;
                            entry.headers = target.headers;
                        }
                        entry.attempts = attempts;
                        entry.last_attempt = now;
                        entry.next_retry = next_retry;
                        entry.last_error = result.error.clone();
                        entry.last_status_code = result.status_code;
                        entry.due = due;
                    }
                    None => {
                        if let Some((event, target)) = fresh {
                            pending.insert(
                                id.to_string(),
                                FailedWebhook {
                                    id: id.to_string(),
                                    event,
                                    url: target.url,
                                    headers: target.headers,
                                    attempts,
                                    last_attempt: now,
                                    next_retry,
                                    last_error: result.error.clone(),
                                    last_status_code: result.status_code,
                                    due,
                                },
                            );
                        }
                    }
                }

                let instance = pending
                    .get(id)
                    .map(|entry| entry.event.instance.clone())
                    .unwrap_or_default();
                Ok((attempts, delay, instance))
            }
        };

        match scheduled {
            Ok((attempts, delay, instance)) => {
                warn!(
                    webhook_id = %id,
                    instance = %instance,
                    attempt = attempts,
                    max_retries = self.config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Webhook retry scheduled"
                );
                let signal = MonitoringSignal::new(MonitoringEvent::WebhookFailed)
                    .instance(instance)
                    .field(
                        "error",
                        format!("Webhook retry scheduled (attempt {}/{})", attempts, self.config.max_retries),
                    )
                    .field("statusCode", result.status_code)
                    .field("webhookId", id)
                    .field("nextRetry", next_retry_string(now, delay));
                self.delivery.send_monitoring(signal).await;
                RetryOutcome::Rescheduled {
                    id: id.to_string(),
                    attempts,
                }
            }
            Err((attempts, instance)) => {
                self.give_up(id, &instance, attempts, result).await;
                RetryOutcome::Exhausted {
                    id: id.to_string(),
                    attempts,
                }
            }
        }
    }

    async fn give_up(&self, id: &str, instance: &str, attempts: u32, result: &WebhookResult) {
        self.permanently_failed.fetch_add(1, Ordering::Relaxed);
        error!(
            webhook_id = %id,
            instance = %instance,
            attempts,
            error = result.error_message(),
            "Webhook permanently failed"
        );

        let mut extra = Map::new();
        extra.insert("webhookId".to_string(), json!(id));
        extra.insert("finalError".to_string(), json!(result.error));
        extra.insert("finalStatusCode".to_string(), json!(result.status_code));
        extra.insert("totalAttempts".to_string(), json!(attempts));

        let instance = (!instance.is_empty()).then_some(instance);
        self.delivery
            .send_error(
                &format!("Webhook permanently failed after {} attempts", self.config.max_retries),
                instance,
                Some(extra),
            )
            .await;
    }

    pub fn stats(&self) -> RetryStats {
        let pending = self.pending.lock();
        let total_attempts: u64 = pending.values().map(|entry| u64::from(entry.attempts)).sum();
        RetryStats {
            pending: pending.len(),
            average_attempts: if pending.is_empty() {
                0.0
            } else {
                total_attempts as f64 / pending.len() as f64
            },
            total_retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            permanently_failed: self.permanently_failed.load(Ordering::Relaxed),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Entries waiting for a retry, soonest first
    pub fn failed_webhooks(&self) -> Vec<FailedWebhook> {
        let mut entries: Vec<FailedWebhook> = self.pending.lock().values().cloned().collect();
        entries.sort_by_key(|entry| entry.due);
        entries
    }

    /// Drop one entry; false when the id is unknown
    pub fn clear(&self, id: &str) -> bool {
        let removed = self.pending.lock().remove(id).is_some();
        if removed {
            info!(webhook_id = %id, "Cleared failed webhook");
        }
        removed
    }

    pub fn clear_all(&self) -> usize {
        let mut pending = self.pending.lock();
        let count = pending.len();
        pending.clear();
        info!(count, "Cleared all failed webhooks");
        count
    }

    /// Start the periodic sweep
    pub fn start(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }
        let scheduler = Arc::clone(self);
        *sweeper = Some(PeriodicTask::spawn(
            "webhook-retry-sweep",
            self.config.sweep_interval(),
            move || {
                let scheduler = Arc::clone(&scheduler);
                async move {
                    let outcomes = scheduler.process_due().await;
                    if !outcomes.is_empty() {
                        debug!(processed = outcomes.len(), "Retry sweep finished");
                    }
                }
            },
        ));
        info!(interval_ms = self.config.sweep_interval_ms, "Webhook retry sweep started");
    }

    /// Stop the sweep; parked entries stay where they are
    pub async fn stop(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(task) = sweeper {
            task.stop().await;
            info!("Webhook retry sweep stopped");
        }
    }
}

fn next_retry_string(now: chrono::DateTime<chrono::Utc>, delay: Duration) -> Value {
    json!((now + chrono::Duration::milliseconds(delay.as_millis() as i64)).to_rfc3339())
}
