//! Token bucket admission control

#[cfg(test)]
mod tests {
    use crate::common::assertions::request_count;
    use crate::common::{EventFactory, eventually, queued_config};
    use event_relay::config::models::rate_limit::TokenBucketConfig;
    use event_relay::core::rate_limiter::TokenBucket;
    use event_relay::{InboundEvent, Relay};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test(start_paused = true)]
    async fn test_burst_beyond_capacity_waits_for_refill() {
        let bucket = TokenBucket::new(&TokenBucketConfig {
            capacity: 10,
            refill_rate: 5,
            refill_interval_ms: 1_000,
        });

        let admitted = (0..20).filter(|_| bucket.consume(1)).count();
        assert_eq!(admitted, 10);
        assert_eq!(bucket.status().tokens, 0);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!bucket.consume(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!((0..10).filter(|_| bucket.consume(1)).count(), 5);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(bucket.status().tokens, 10);
    }

    #[tokio::test]
    async fn test_queued_events_beyond_capacity_are_held_until_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/main"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = queued_config(&server);
        config.relay.token_bucket = TokenBucketConfig {
            capacity: 10,
            refill_rate: 5,
            refill_interval_ms: 3_600_000,
        };
        let relay = Relay::new(config).unwrap();
        relay.start().await.unwrap();

        for i in 0..20 {
            let outcome = relay
                .ingest(InboundEvent::new("inst", EventFactory::text(&format!("message {}", i))))
                .await;
            assert!(outcome.is_enqueued());
        }

        eventually("first ten delivered", || async {
            request_count(&server, "/main").await == 10
        })
        .await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(request_count(&server, "/main").await, 10);

        let metrics = relay.metrics().await;
        assert_eq!(metrics.processed_today, 10);
        assert!(metrics.rate_limit_hits > 0);
        assert_eq!(metrics.total_errors, 0);
        assert_eq!(metrics.tokens_available, 0);
        assert_eq!(metrics.refill_rate, "5/3600000ms");

        relay.reset_token_bucket();
        eventually("remaining ten delivered", || async {
            request_count(&server, "/main").await == 20
        })
        .await;
        assert_eq!(relay.queue_metrics().await.dead_lettered, 0);

        relay.shutdown().await;
    }
}
