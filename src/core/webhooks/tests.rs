//! Tests for webhook delivery, retries and the delivery log

#[cfg(test)]
mod tests {
    use super::super::delivery::DeliveryService;
    use super::super::logger::{WebhookLogger, categorize_error};
    use super::super::retry::RetryScheduler;
    use super::super::types::{
        DeliveryFailure, ExportFormat, LogMetadata, LoggedResult, MonitoringEvent, RetryOutcome,
        WebhookChannel, WebhookEvent, WebhookLogEntry, WebhookResult,
    };
    use crate::config::models::server::ServerConfig;
    use crate::config::models::webhook::{
        MainWebhookConfig, MonitoringWebhookConfig, RetryConfig, WebhookLogConfig, WebhookTarget,
    };
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn server_config() -> ServerConfig {
        ServerConfig {
            url: "https://relay.example.com".to_string(),
            api_key: Some("secret-key".to_string()),
        }
    }

    fn delivery(main_url: Option<String>, monitoring_url: Option<String>) -> DeliveryService {
        let main = MainWebhookConfig {
            url: main_url,
            timeout_ms: 2_000,
            ..MainWebhookConfig::default()
        };
        let monitoring = MonitoringWebhookConfig {
            enabled: monitoring_url.is_some(),
            url: monitoring_url,
            timeout_ms: 2_000,
        };
        let logger = Arc::new(WebhookLogger::new(WebhookLogConfig::default()));
        DeliveryService::new(server_config(), main, monitoring, logger).unwrap()
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 20,
            max_delay_ms: 200,
            backoff_factor: 2.0,
            ..RetryConfig::default()
        }
    }

    fn target(url: String) -> Option<WebhookTarget> {
        Some(WebhookTarget {
            url,
            headers: HashMap::new(),
        })
    }

    async fn bodies(server: &MockServer, route: &str) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == route)
            .map(|request| serde_json::from_slice(&request.body).unwrap())
            .collect()
    }

    /// Sweep until something other than a reschedule happens
    async fn sweep_until_settled(scheduler: &RetryScheduler) -> Vec<RetryOutcome> {
        let mut history = Vec::new();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let outcomes = scheduler.process_due().await;
            let settled = outcomes
                .iter()
                .any(|outcome| !matches!(outcome, RetryOutcome::Rescheduled { .. }));
            history.extend(outcomes);
            if settled {
                break;
            }
        }
        history
    }

    #[tokio::test]
    async fn test_main_webhook_enriches_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let service = delivery(Some(format!("{}/main", server.uri())), None);
        let event = WebhookEvent::message("inst-1", json!({"key": {"id": "m1"}}));
        let result = service.send_main(&event, service.main_target("inst-1").as_ref()).await;

        assert!(result.success);
        assert_eq!(result.status_code, Some(200));

        let sent = bodies(&server, "/main").await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["event"], "messages.upsert");
        assert_eq!(sent[0]["instance"], "inst-1");
        assert_eq!(sent[0]["server_url"], "https://relay.example.com");
        assert_eq!(sent[0]["apikey"], "secret-key");
        assert!(sent[0]["timestamp"].is_string());
        assert_eq!(sent[0]["data"]["key"]["id"], "m1");
    }

    #[tokio::test]
    async fn test_main_failure_reports_on_monitoring_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/monitor"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let service = delivery(
            Some(format!("{}/main", server.uri())),
            Some(format!("{}/monitor", server.uri())),
        );
        let event = WebhookEvent::message("inst-1", json!({}));
        let result = service.send_main(&event, service.main_target("inst-1").as_ref()).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(DeliveryFailure::Status(500)));
        assert!(result.error_message().contains("500"));

        let signals = bodies(&server, "/monitor").await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0]["event"], "webhook.failed");
        assert_eq!(signals[0]["instance"], "inst-1");
        assert_eq!(signals[0]["data"]["statusCode"], 500);
        assert_eq!(signals[0]["server_url"], "https://relay.example.com");
    }

    #[tokio::test]
    async fn test_missing_target_is_a_failure() {
        let service = delivery(None, None);
        let event = WebhookEvent::message("inst-1", json!({}));
        let result = service.send_main(&event, service.main_target("inst-1").as_ref()).await;

        assert!(!result.success);
        assert_eq!(result.failure, Some(DeliveryFailure::NotConfigured));
        assert_eq!(service.logger().errors(10).len(), 1);
    }

    #[tokio::test]
    async fn test_network_error_has_no_status() {
        // Nothing listens on port 9 of localhost
        let service = delivery(Some("http://127.0.0.1:9/hook".to_string()), None);
        let event = WebhookEvent::message("inst-1", json!({}));
        let result = service.send_main(&event, service.main_target("inst-1").as_ref()).await;

        assert!(!result.success);
        assert_eq!(result.status_code, None);
        assert!(matches!(
            result.failure,
            Some(DeliveryFailure::Network) | Some(DeliveryFailure::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_monitoring_unconfigured_is_noop_success() {
        let service = delivery(None, None);
        let result = service.send_rate_limit_exceeded(Some("inst-1"), None).await;
        assert!(result.success);
        assert_eq!(result.status_code, None);
        assert!(service.logger().is_empty());
    }

    #[tokio::test]
    async fn test_monitoring_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let service = delivery(None, Some(format!("{}/monitor", server.uri())));
        let result = service.send_error("disk full", Some("inst-1"), None).await;
        assert!(!result.success);
        assert_eq!(service.logger().metrics().failed, 1);
    }

    #[tokio::test]
    async fn test_convenience_signals() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let service = delivery(None, Some(format!("{}/monitor", server.uri())));
        service.send_queue_stats(7, 42, None, Some(json!({"tokens": 3}))).await;
        service
            .send_filter_applied("inst-1", "duration", json!({"reason": "tooLong", "duration": 900}))
            .await;
        service.send_rate_limit_exceeded(Some("inst-1"), None).await;
        let mut extra = serde_json::Map::new();
        extra.insert("queueSize".to_string(), json!(12));
        service.send_error("boom", None, Some(extra)).await;

        let signals = bodies(&server, "/monitor").await;
        assert_eq!(signals.len(), 4);

        assert_eq!(signals[0]["event"], "queue.stats");
        assert_eq!(signals[0]["data"]["queueSize"], 7);
        assert_eq!(signals[0]["data"]["processedCount"], 42);
        assert_eq!(signals[0]["data"]["rateLimitStats"]["tokens"], 3);
        assert!(signals[0]["data"].get("audioFilterStats").is_none());

        assert_eq!(signals[1]["event"], "filter.applied");
        assert_eq!(signals[1]["data"]["filteredCount"], 1);
        assert_eq!(signals[1]["data"]["audioFilterStats"]["tooLong"], 1);
        assert_eq!(signals[1]["data"]["audioFilterStats"]["tooShort"], 0);

        assert_eq!(signals[2]["event"], "rate_limit.exceeded");
        assert_eq!(signals[2]["data"]["error"], "Rate limit exceeded");

        assert_eq!(signals[3]["event"], "queue.error");
        assert_eq!(signals[3]["data"]["error"], "boom");
        assert_eq!(signals[3]["data"]["queueSize"], 12);
        assert!(signals[3].get("instance").is_none());
    }

    #[tokio::test]
    async fn test_per_subject_target_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/special"))
            .and(header("X-Tenant", "acme"))
            .and(header("X-Global", "yes"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut main = MainWebhookConfig {
            url: Some(format!("{}/default", server.uri())),
            ..MainWebhookConfig::default()
        };
        main.headers.insert("X-Global".to_string(), "yes".to_string());
        main.targets.insert(
            "acme".to_string(),
            WebhookTarget {
                url: format!("{}/special", server.uri()),
                headers: HashMap::from([("X-Tenant".to_string(), "acme".to_string())]),
            },
        );
        let logger = Arc::new(WebhookLogger::new(WebhookLogConfig::default()));
        let service = DeliveryService::new(server_config(), main, MonitoringWebhookConfig::default(), logger).unwrap();

        let event = WebhookEvent::message("acme", json!({}));
        let result = service.send_main(&event, service.main_target("acme").as_ref()).await;
        assert!(result.success);
        assert_eq!(result.status_code, Some(204));

        let fallback = service.main_target("other").unwrap();
        assert!(fallback.url.ends_with("/default"));
    }

    #[test]
    fn test_webhook_id_is_stable() {
        let a = RetryScheduler::webhook_id("inst", "messages.upsert", "http://x/hook");
        let b = RetryScheduler::webhook_id("inst", "messages.upsert", "http://x/hook");
        let c = RetryScheduler::webhook_id("inst2", "messages.upsert", "http://x/hook");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_should_retry_classification() {
        let scheduler = RetryScheduler::new(delivery(None, None), RetryConfig::default());

        let network = WebhookResult::failed(DeliveryFailure::Network, "Network error", 3);
        let timeout = WebhookResult::failed(DeliveryFailure::Timeout, "Request timeout", 3);
        let unavailable = WebhookResult::failed(DeliveryFailure::Status(503), "503", 3);
        let throttled = WebhookResult::failed(DeliveryFailure::Status(429), "429", 3);
        let missing = WebhookResult::failed(DeliveryFailure::Status(404), "404", 3);
        let unconfigured = WebhookResult::failed(DeliveryFailure::NotConfigured, "none", 0);

        assert!(scheduler.should_retry(&network));
        assert!(scheduler.should_retry(&timeout));
        assert!(scheduler.should_retry(&unavailable));
        assert!(scheduler.should_retry(&throttled));
        assert!(!scheduler.should_retry(&missing));
        assert!(!scheduler.should_retry(&unconfigured));
        assert!(!scheduler.should_retry(&WebhookResult::delivered(200, 1)));
    }

    #[test]
    fn test_retry_delay_bounds() {
        let config = RetryConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            ..RetryConfig::default()
        };
        let scheduler = RetryScheduler::new(delivery(None, None), config);

        for _ in 0..50 {
            let first = scheduler.retry_delay(1).as_millis();
            assert!((1_000..=1_100).contains(&first), "first delay {}", first);
            let third = scheduler.retry_delay(3).as_millis();
            assert!((4_000..=4_400).contains(&third), "third delay {}", third);
            assert_eq!(scheduler.retry_delay(10).as_millis(), 10_000);
        }
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_parked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let scheduler = RetryScheduler::new(delivery(None, None), fast_retry(5));
        let event = WebhookEvent::message("inst-1", json!({}));
        let result = scheduler.send_with_retry(event, target(format!("{}/hook", server.uri()))).await;

        assert_eq!(result.status_code, Some(404));
        assert_eq!(scheduler.pending_count(), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.process_due().await.is_empty());
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_fourth_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let scheduler = RetryScheduler::new(delivery(None, None), fast_retry(5));
        let event = WebhookEvent::message("inst-1", json!({"n": 1}));
        let first = scheduler.send_with_retry(event, target(format!("{}/hook", server.uri()))).await;
        assert_eq!(first.status_code, Some(503));
        assert_eq!(scheduler.pending_count(), 1);

        let outcomes = sweep_until_settled(&scheduler).await;
        let last = outcomes.last().cloned();
        assert!(
            matches!(last, Some(RetryOutcome::Delivered { attempts: 4, .. })),
            "outcomes: {:?}",
            outcomes
        );
        assert_eq!(scheduler.pending_count(), 0);

        let stats = scheduler.stats();
        assert_eq!(stats.total_retry_attempts, 3);
        assert_eq!(stats.permanently_failed, 0);
        assert_eq!(bodies(&server, "/hook").await.len(), 4);

        let attempts: Vec<Option<u32>> = scheduler
            .delivery()
            .logger()
            .recent(10)
            .iter()
            .filter(|entry| entry.channel == WebhookChannel::Main)
            .map(|entry| entry.metadata.attempt)
            .collect();
        assert_eq!(attempts, vec![Some(1), Some(2), Some(3), Some(4)]);
    }

    #[tokio::test]
    async fn test_exhausted_retries_signal_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/monitor"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let scheduler = RetryScheduler::new(delivery(None, Some(format!("{}/monitor", server.uri()))), fast_retry(2));
        let event = WebhookEvent::message("inst-1", json!({}));
        scheduler.send_with_retry(event, target(format!("{}/hook", server.uri()))).await;

        let outcomes = sweep_until_settled(&scheduler).await;
        assert!(matches!(outcomes.last(), Some(RetryOutcome::Exhausted { attempts: 3, .. })));
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.stats().permanently_failed, 1);

        // Initial send plus two retries
        assert_eq!(bodies(&server, "/hook").await.len(), 3);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(scheduler.process_due().await.is_empty());

        let permanent: Vec<Value> = bodies(&server, "/monitor")
            .await
            .into_iter()
            .filter(|signal| signal["event"] == MonitoringEvent::QueueError.as_str())
            .collect();
        assert_eq!(permanent.len(), 1);
        assert_eq!(permanent[0]["data"]["error"], "Webhook permanently failed after 2 attempts");
        assert_eq!(permanent[0]["data"]["totalAttempts"], 3);
        assert_eq!(permanent[0]["data"]["finalStatusCode"], 502);
    }

    #[tokio::test]
    async fn test_one_entry_per_key_and_clear() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scheduler = RetryScheduler::new(
            delivery(None, None),
            RetryConfig {
                base_delay_ms: 60_000,
                max_delay_ms: 120_000,
                ..RetryConfig::default()
            },
        );
        let url = format!("{}/hook", server.uri());
        let event = WebhookEvent::message("inst-1", json!({}));
        scheduler.send_with_retry(event.clone(), target(url.clone())).await;
        scheduler.send_with_retry(event.clone(), target(url.clone())).await;
        scheduler
            .send_with_retry(WebhookEvent::message("inst-2", json!({})), target(url.clone()))
            .await;

        let failed = scheduler.failed_webhooks();
        assert_eq!(failed.len(), 2);
        let stats = scheduler.stats();
        assert_eq!(stats.pending, 2);
        assert!((stats.average_attempts - 1.5).abs() < f64::EPSILON);

        let id = RetryScheduler::webhook_id("inst-1", "messages.upsert", &url);
        assert!(scheduler.clear(&id));
        assert!(!scheduler.clear(&id));
        assert_eq!(scheduler.clear_all(), 1);
        assert!(scheduler.failed_webhooks().is_empty());
    }

    #[tokio::test]
    async fn test_newer_failure_replaces_parked_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scheduler = RetryScheduler::new(
            delivery(None, None),
            RetryConfig {
                base_delay_ms: 60_000,
                max_delay_ms: 120_000,
                ..RetryConfig::default()
            },
        );
        let url = format!("{}/hook", server.uri());
        scheduler
            .send_with_retry(WebhookEvent::message("inst-1", json!({"n": 1})), target(url.clone()))
            .await;
        scheduler
            .send_with_retry(WebhookEvent::message("inst-1", json!({"n": 2})), target(url.clone()))
            .await;

        let failed = scheduler.failed_webhooks();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 2);
        assert_eq!(failed[0].event.data, json!({"n": 2}));
        assert_eq!(failed[0].url, url);
    }

    fn entry(instance: &str, success: bool, status: Option<u16>, attempt: u32) -> WebhookLogEntry {
        WebhookLogEntry {
            timestamp: chrono::Utc::now(),
            channel: WebhookChannel::Main,
            event: "messages.upsert".to_string(),
            instance: Some(instance.to_string()),
            webhook_url: Some("http://x/hook".to_string()),
            payload_summary: None,
            result: Some(LoggedResult {
                success,
                status_code: status,
                response_time_ms: 100,
                error: (!success).then(|| "Webhook returned status".to_string()),
            }),
            metadata: LogMetadata {
                attempt: Some(attempt),
                ..LogMetadata::default()
            },
        }
    }

    #[test]
    fn test_logger_metrics_and_summary() {
        let logger = WebhookLogger::new(WebhookLogConfig::default());
        logger.record(entry("a", true, Some(200), 1));
        logger.record(entry("a", false, Some(503), 1));
        logger.record(entry("a", true, Some(200), 2));
        logger.record(entry("b", false, Some(404), 1));

        let metrics = logger.metrics();
        assert_eq!(metrics.total, 4);
        assert_eq!(metrics.successful, 2);
        assert_eq!(metrics.failed, 2);
        assert_eq!(metrics.retries, 1);
        assert_eq!(metrics.errors_by_type["server_error"], 1);
        assert_eq!(metrics.errors_by_type["client_error"], 1);
        assert!((metrics.average_response_time_ms - 100.0).abs() < 1e-9);

        let summary = logger.summary();
        assert!((summary.success_rate - 50.0).abs() < 1e-9);
        assert!((summary.retry_rate - 25.0).abs() < 1e-9);
        assert_eq!(summary.top_instances[0].instance, "a");
        assert_eq!(summary.top_instances[0].total, 3);

        assert_eq!(logger.by_instance("b", 10).len(), 1);
        assert_eq!(logger.errors(10).len(), 2);
        assert_eq!(logger.recent(2).len(), 2);
    }

    #[test]
    fn test_logger_cap_and_age_pruning() {
        let logger = WebhookLogger::new(WebhookLogConfig {
            max_entries: 3,
            max_age_secs: 60,
        });
        for _ in 0..5 {
            logger.record(entry("a", true, Some(200), 1));
        }
        assert_eq!(logger.len(), 3);
        assert_eq!(logger.metrics().total, 5);

        let later = chrono::Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(logger.prune_expired_at(later), 3);
        assert!(logger.is_empty());
    }

    #[test]
    fn test_logger_export() {
        let logger = WebhookLogger::new(WebhookLogConfig::default());
        logger.record(entry("a", true, Some(200), 1));
        logger.record(entry("b,c", false, Some(500), 2));

        let csv = logger.export(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,type,event,instance,success"));
        assert!(lines[2].contains("\"b,c\""));
        assert!(lines[2].contains(",500,"));

        let exported: Value = serde_json::from_str(&logger.export(ExportFormat::Json).unwrap()).unwrap();
        assert_eq!(exported["totalLogs"], 2);
        assert_eq!(exported["metrics"]["total"], 2);
        assert_eq!(exported["logs"][1]["instance"], "b,c");

        logger.clear();
        assert!(logger.is_empty());
        assert_eq!(logger.metrics().total, 0);
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(categorize_error("anything", Some(404)), "client_error");
        assert_eq!(categorize_error("anything", Some(502)), "server_error");
        assert_eq!(categorize_error("Request timeout after 30000ms", None), "timeout");
        assert_eq!(categorize_error("Network error: connection refused", None), "network_error");
        assert_eq!(categorize_error("dns lookup failed", None), "dns_error");
        assert_eq!(categorize_error("weird", None), "unknown_error");
    }
}
