//! Direct delivery and in-process retries

#[cfg(test)]
mod tests {
    use crate::common::assertions::request_count;
    use crate::common::{EventFactory, direct_config, eventually, queued_config};
    use event_relay::core::webhooks::{DeliveryFailure, WebhookChannel};
    use event_relay::{InboundEvent, IngestOutcome, Relay};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delivered(outcome: IngestOutcome) -> event_relay::core::webhooks::WebhookResult {
        match outcome {
            IngestOutcome::Delivered(result) => result,
            other => panic!("expected a direct delivery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_retry_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let relay = Relay::new(direct_config(&server)).unwrap();
        relay.start().await.unwrap();

        let result = delivered(relay.ingest(InboundEvent::new("inst", EventFactory::text("hi"))).await);
        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(relay.failed_webhooks().len(), 1);

        eventually("parked webhook delivered", || async { relay.failed_webhooks().is_empty() }).await;
        assert_eq!(request_count(&server, "/main").await, 4);

        let attempts: Vec<_> = relay
            .recent_deliveries(100)
            .into_iter()
            .filter(|entry| entry.channel == WebhookChannel::Main)
            .collect();
        let numbers: Vec<u32> = attempts.iter().filter_map(|entry| entry.metadata.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(attempts.last().and_then(|entry| entry.result.as_ref()).is_some_and(|r| r.success));

        // Backoff doubles from a 20ms base
        let gaps: Vec<i64> = attempts
            .windows(2)
            .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds())
            .collect();
        assert!(gaps[0] >= 20, "first retry after {}ms", gaps[0]);
        assert!(gaps[2] > gaps[0], "gaps {:?}", gaps);

        let stats = relay.retry_stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_retry_attempts, 3);
        assert_eq!(stats.permanently_failed, 0);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let relay = Relay::new(direct_config(&server)).unwrap();
        relay.start().await.unwrap();

        let result = delivered(relay.ingest(InboundEvent::new("inst", EventFactory::text("hi"))).await);
        assert_eq!(result.failure, Some(DeliveryFailure::Status(404)));
        assert!(relay.failed_webhooks().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(request_count(&server, "/main").await, 1);
        assert_eq!(relay.delivery_errors(10).len(), 1);
        assert_eq!(relay.metrics().await.total_errors, 1);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut config = direct_config(&server);
        config.relay.webhook.retry.max_retries = 2;
        let relay = Relay::new(config).unwrap();
        relay.start().await.unwrap();

        relay.ingest(InboundEvent::new("inst", EventFactory::text("hi"))).await;
        eventually("retries exhausted", || async { relay.retry_stats().permanently_failed == 1 }).await;

        assert!(relay.failed_webhooks().is_empty());
        assert_eq!(request_count(&server, "/main").await, 3);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_unstarted_queue_falls_back_to_direct_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let relay = Relay::new(queued_config(&server)).unwrap();
        let result = delivered(relay.ingest(InboundEvent::new("inst", EventFactory::text("hi"))).await);

        assert!(result.success);
        assert_eq!(relay.metrics().await.processed_today, 1);
        assert_eq!(relay.queue_metrics().await.published, 0);
    }

    #[tokio::test]
    async fn test_missing_main_url_is_reported_not_retried() {
        let server = MockServer::start().await;
        let mut config = direct_config(&server);
        config.relay.webhook.main.url = None;
        let relay = Relay::new(config).unwrap();

        let result = delivered(relay.ingest(InboundEvent::new("inst", EventFactory::text("hi"))).await);
        assert!(!result.success);
        assert_eq!(result.failure, Some(DeliveryFailure::NotConfigured));
        assert!(relay.failed_webhooks().is_empty());
    }
}
