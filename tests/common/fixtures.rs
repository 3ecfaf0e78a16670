//! Test fixtures and data factories
//!
//! Configurations keep every interval short so background tasks act within a test's
//! lifetime; monitoring is off unless a test turns it on.

use event_relay::Config;
use event_relay::config::models::filter::{AudioDurationFilter, MessageFilter};
use event_relay::config::models::queue::{QueueBackend, QueueConfig};
use event_relay::config::models::webhook::RetryConfig;
use event_relay::core::queue::AudioMetadata;
use serde_json::{Value, json};
use wiremock::MockServer;

pub const SERVER_URL: &str = "https://relay.example.com";
pub const API_KEY: &str = "secret-key";
pub const CHAT_ID: &str = "5511999999999@s.whatsapp.net";

/// Relay routing admitted events through the in-memory queue
pub fn queued_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.relay.server.url = SERVER_URL.to_string();
    config.relay.server.api_key = Some(API_KEY.to_string());
    config.relay.queue = QueueConfig {
        enabled: true,
        backend: QueueBackend::Memory,
        block_timeout_ms: 20,
        rate_limit_backoff_ms: 30,
        ..QueueConfig::default()
    };
    config.relay.webhook.main.url = Some(format!("{}/main", server.uri()));
    config.relay.webhook.main.timeout_ms = 2_000;
    config.relay.webhook.retry = RetryConfig {
        max_retries: 3,
        base_delay_ms: 20,
        max_delay_ms: 200,
        backoff_factor: 2.0,
        sweep_interval_ms: 10,
        ..RetryConfig::default()
    };
    config
}

/// Relay with the queue disabled, so admitted events go straight to the main webhook
pub fn direct_config(server: &MockServer) -> Config {
    let mut config = queued_config(server);
    config.relay.queue.enabled = false;
    config
}

/// Factory for messaging events
pub struct EventFactory;

impl EventFactory {
    pub fn text(text: &str) -> Value {
        json!({
            "key": { "remoteJid": CHAT_ID, "id": "TEXT1", "fromMe": false },
            "message": { "conversation": text }
        })
    }

    pub fn audio(seconds: f64) -> Value {
        json!({
            "key": { "remoteJid": CHAT_ID, "id": "AUDIO1", "fromMe": false },
            "message": {
                "audioMessage": { "seconds": seconds, "fileLength": 48000, "mimetype": "audio/ogg" }
            }
        })
    }

    pub fn audio_metadata(seconds: f64) -> AudioMetadata {
        AudioMetadata {
            url: "https://media.example.com/audio/AUDIO1.ogg".to_string(),
            duration: seconds,
            mime_type: "audio/ogg".to_string(),
        }
    }

    pub fn duration_filter(min: f64, max: f64) -> MessageFilter {
        MessageFilter {
            audio_duration_filter: Some(AudioDurationFilter {
                enabled: true,
                min_duration_seconds: Some(min),
                max_duration_seconds: Some(max),
            }),
            ..MessageFilter::default()
        }
    }
}
