//! Filtering and queued delivery

#[cfg(test)]
mod tests {
    use crate::common::assertions::{bodies, request_count};
    use crate::common::fixtures::{API_KEY, SERVER_URL};
    use crate::common::{EventFactory, eventually, queued_config};
    use event_relay::config::models::filter::MessageFilter;
    use event_relay::{InboundEvent, IngestOutcome, Relay};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_ok(server: &MockServer, route: &str) {
        Mock::given(method("POST"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_short_audio_is_filtered_and_never_delivered() {
        let server = MockServer::start().await;
        mount_ok(&server, "/main").await;

        let relay = Relay::new(queued_config(&server)).unwrap();
        relay.start().await.unwrap();

        let inbound = InboundEvent::new("inst", EventFactory::audio(2.0))
            .with_filter(EventFactory::duration_filter(5.0, 120.0));
        match relay.ingest(inbound).await {
            IngestOutcome::Filtered(decision) => {
                assert!(!decision.allowed);
                assert!(decision.reason.as_deref().unwrap_or_default().contains("below minimum"));
                assert_eq!(decision.message_kind, "audioMessage");
            }
            other => panic!("expected a filtered outcome, got {:?}", other),
        }

        assert_eq!(relay.filter_stats()["inst"].too_short, 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(request_count(&server, "/main").await, 0);
        assert_eq!(relay.queue_metrics().await.published, 0);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_admitted_audio_is_enqueued_and_delivered_enriched() {
        let server = MockServer::start().await;
        mount_ok(&server, "/main").await;

        let relay = Relay::new(queued_config(&server)).unwrap();
        relay.start().await.unwrap();

        let inbound = InboundEvent::new("inst", EventFactory::audio(30.0))
            .with_filter(EventFactory::duration_filter(5.0, 120.0))
            .with_audio(EventFactory::audio_metadata(30.0));
        let outcome = relay.ingest(inbound).await;
        assert!(outcome.is_enqueued(), "unexpected outcome {:?}", outcome);

        eventually("main webhook receives the event", || async {
            request_count(&server, "/main").await == 1
        })
        .await;

        let body = &bodies(&server, "/main").await[0];
        assert_eq!(body["event"], "messages.upsert");
        assert_eq!(body["instance"], "inst");
        assert_eq!(body["server_url"], SERVER_URL);
        assert_eq!(body["apikey"], API_KEY);
        assert!(body["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
        assert_eq!(body["data"]["audioUrl"], "https://media.example.com/audio/AUDIO1.ogg");
        assert_eq!(body["data"]["audioDuration"], 30.0);
        assert_eq!(body["data"]["key"]["id"], "AUDIO1");

        eventually("processed counter catches up", || async {
            relay.processor_stats().await.processed_today == 1
        })
        .await;
        let filter = &relay.filter_stats()["inst"];
        assert_eq!(filter.processed, 1);
        assert_eq!(relay.queue_metrics().await.consumed, 1);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_blocked_event_emits_filter_applied_signal() {
        let server = MockServer::start().await;
        mount_ok(&server, "/main").await;
        mount_ok(&server, "/monitor").await;

        let mut config = queued_config(&server);
        config.relay.webhook.monitoring.enabled = true;
        config.relay.webhook.monitoring.url = Some(format!("{}/monitor", server.uri()));
        let relay = Relay::new(config).unwrap();

        let filter = MessageFilter {
            message_types: vec!["audioMessage".to_string()],
            ..MessageFilter::default()
        };
        let outcome = relay
            .ingest(InboundEvent::new("inst", EventFactory::text("hello")).with_filter(filter))
            .await;
        assert!(outcome.is_filtered());

        let signals = bodies(&server, "/monitor").await;
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0]["event"], "filter.applied");
        assert_eq!(signals[0]["instance"], "inst");
        assert_eq!(signals[0]["data"]["filterType"], "messageType");
        assert_eq!(signals[0]["data"]["filteredCount"], 1);
        assert_eq!(request_count(&server, "/main").await, 0);
    }

    #[tokio::test]
    async fn test_malformed_event_fails_closed() {
        let server = MockServer::start().await;
        mount_ok(&server, "/main").await;

        let relay = Relay::new(queued_config(&server)).unwrap();
        let outcome = relay
            .ingest(InboundEvent::new("inst", serde_json::json!(["not", "an", "object"])))
            .await;

        match outcome {
            IngestOutcome::Filtered(decision) => {
                assert!(decision.reason.as_deref().unwrap_or_default().contains("Filter error"));
            }
            other => panic!("expected a filtered outcome, got {:?}", other),
        }
        assert_eq!(request_count(&server, "/main").await, 0);
    }
}
