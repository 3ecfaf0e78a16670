//! Query and administrative operations of the relay

#[cfg(test)]
mod tests {
    use crate::common::assertions::bodies;
    use crate::common::fixtures::CHAT_ID;
    use crate::common::{EventFactory, direct_config, eventually, queued_config};
    use event_relay::core::feedback::{FinishRequest, FinishStatus, StartRequest};
    use event_relay::core::webhooks::ExportFormat;
    use event_relay::monitoring::HealthStatus;
    use event_relay::{InboundEvent, Relay, RelayError};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, route: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_health_reflects_processor_state() {
        let server = MockServer::start().await;
        mount(&server, "/main", 200).await;

        let relay = Relay::new(queued_config(&server)).unwrap();
        let stopped = relay.health().await;
        assert_eq!(stopped.status, HealthStatus::Critical);
        assert!(stopped.issues.iter().any(|issue| issue.contains("not running")));

        relay.start().await.unwrap();
        let running = relay.health().await;
        assert_eq!(running.status, HealthStatus::Healthy, "issues: {:?}", running.issues);

        let metrics = relay.metrics().await;
        assert!(metrics.is_processor_running);
        assert_eq!(metrics.token_capacity, relay.token_bucket_status().capacity);

        relay.shutdown().await;
        assert!(!relay.metrics().await.is_processor_running);
    }

    #[tokio::test]
    async fn test_delivery_log_queries_and_export() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let relay = Relay::new(direct_config(&server)).unwrap();
        relay.ingest(InboundEvent::new("inst-a", EventFactory::text("one"))).await;
        relay.ingest(InboundEvent::new("inst-b", EventFactory::text("two"))).await;

        assert_eq!(relay.recent_deliveries(10).len(), 2);
        assert_eq!(relay.deliveries_for("inst-a", 10).len(), 1);
        assert_eq!(relay.delivery_errors(1).len(), 1);

        let metrics = relay.delivery_metrics();
        assert_eq!(metrics.total, 2);
        assert_eq!(metrics.failed, 2);
        let summary = relay.delivery_summary();
        assert_eq!(summary.top_errors[0].error_type, "client_error");
        assert_eq!(summary.top_errors[0].count, 2);

        let csv = relay.export_deliveries(ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,type,event,instance,success,statusCode,responseTime,error,attempt")
        );
        assert_eq!(lines.count(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&relay.export_deliveries(ExportFormat::Json).unwrap()).unwrap();
        assert_eq!(json["totalLogs"], 2);

        relay.clear_delivery_logs();
        assert!(relay.recent_deliveries(10).is_empty());
    }

    #[tokio::test]
    async fn test_failed_webhooks_can_be_cleared() {
        let server = MockServer::start().await;
        mount(&server, "/main", 503).await;

        let mut config = direct_config(&server);
        config.relay.webhook.retry.base_delay_ms = 60_000;
        config.relay.webhook.retry.max_delay_ms = 60_000;
        let relay = Relay::new(config).unwrap();

        relay.ingest(InboundEvent::new("inst-a", EventFactory::text("one"))).await;
        relay.ingest(InboundEvent::new("inst-b", EventFactory::text("two"))).await;
        relay.ingest(InboundEvent::new("inst-c", EventFactory::text("three"))).await;

        let failed = relay.failed_webhooks();
        assert_eq!(failed.len(), 3);
        assert!(failed.iter().all(|webhook| webhook.last_status_code == Some(503)));

        assert!(relay.clear_failed_webhook(&failed[0].id));
        assert!(!relay.clear_failed_webhook(&failed[0].id));
        assert_eq!(relay.clear_failed_webhooks(), 2);
        assert_eq!(relay.retry_stats().pending, 0);
    }

    #[tokio::test]
    async fn test_counters_and_bucket_reset() {
        let server = MockServer::start().await;
        mount(&server, "/main", 200).await;

        let relay = Relay::new(direct_config(&server)).unwrap();
        relay
            .ingest(InboundEvent::new("inst", EventFactory::audio(2.0)).with_filter(EventFactory::duration_filter(5.0, 60.0)))
            .await;
        relay.ingest(InboundEvent::new("inst", EventFactory::text("hi"))).await;

        assert_eq!(relay.metrics().await.processed_today, 1);
        relay.reset_daily_counters();
        assert_eq!(relay.metrics().await.processed_today, 0);

        assert_eq!(relay.filter_report("inst").stats.too_short, 1);
        relay.reset_filter_stats(Some("inst"));
        assert_eq!(relay.filter_report("inst").stats.too_short, 0);

        relay.reset_token_bucket();
        let bucket = relay.token_bucket_status();
        assert_eq!(bucket.tokens, bucket.capacity);
    }

    #[tokio::test]
    async fn test_feedback_session_posts_indicators() {
        let server = MockServer::start().await;
        mount(&server, "/message/sendReaction/inst", 200).await;
        mount(&server, "/message/sendText/inst", 200).await;

        let mut config = direct_config(&server);
        config.relay.feedback.outbound_url = Some(server.uri());
        config.relay.feedback.outbound_api_key = Some("api-secret".to_string());
        let relay = Relay::new(config).unwrap();
        relay.start().await.unwrap();

        let id = relay
            .start_feedback(StartRequest::new("inst", CHAT_ID, "MSG1"))
            .unwrap();
        assert_eq!(relay.active_feedback_sessions().len(), 1);
        let duplicate = relay.start_feedback(StartRequest::new("inst", CHAT_ID, "MSG1"));
        assert!(matches!(duplicate, Err(RelayError::Conflict(_))));

        eventually("progress indicator posted", || async {
            !bodies(&server, "/message/sendReaction/inst").await.is_empty()
        })
        .await;

        relay
            .finish_feedback(FinishRequest::new("inst", CHAT_ID, "MSG1", FinishStatus::Success).with_text("Done"))
            .await
            .unwrap();

        let reactions: Vec<String> = bodies(&server, "/message/sendReaction/inst")
            .await
            .iter()
            .filter_map(|body| body["reaction"].as_str().map(str::to_string))
            .collect();
        assert_eq!(reactions.first().map(String::as_str), Some("🔄"));
        assert_eq!(reactions.last().map(String::as_str), Some("✅"));
        assert_eq!(bodies(&server, "/message/sendText/inst").await[0]["text"], "Done");

        assert!(!relay.force_cleanup_feedback(&id).await);
        assert_eq!(relay.feedback_stats().finished, 1);

        relay.shutdown().await;
    }
}
