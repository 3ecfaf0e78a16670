//! Queue types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One admitted event awaiting delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub id: String,
    /// Subject the event belongs to
    pub instance_name: String,
    /// Opaque event payload
    pub message_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_metadata: Option<AudioMetadata>,
    /// Enqueue time in milliseconds since the epoch
    pub timestamp: i64,
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Failed deliveries so far
    #[serde(default)]
    pub retry_count: u32,
}

fn default_priority() -> u8 {
    1
}

impl QueuedMessage {
    pub fn new(instance_name: impl Into<String>, message_data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            instance_name: instance_name.into(),
            message_data,
            audio_metadata: None,
            timestamp: Utc::now().timestamp_millis(),
            priority: default_priority(),
            retry_count: 0,
        }
    }

    pub fn with_audio_metadata(mut self, metadata: AudioMetadata) -> Self {
        self.audio_metadata = Some(metadata);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn enqueued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// The payload with `audioUrl`, `audioDuration` and `mimeType` merged in
    pub fn delivery_data(&self) -> Value {
        let mut data = self.message_data.clone();
        if let (Some(audio), Value::Object(fields)) = (&self.audio_metadata, &mut data) {
            fields.insert("audioUrl".to_string(), Value::from(audio.url.clone()));
            fields.insert("audioDuration".to_string(), Value::from(audio.duration));
            fields.insert("mimeType".to_string(), Value::from(audio.mime_type.clone()));
        }
        data
    }
}

/// Audio attached to a queued message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetadata {
    pub url: String,
    /// Seconds
    pub duration: f64,
    pub mime_type: String,
}

/// A message handed out by a broker, identified by its delivery tag until settled
#[derive(Debug, Clone)]
pub struct BrokerDelivery {
    pub tag: String,
    pub message: QueuedMessage,
}

/// A message diverted after exhausting its redeliveries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub message: QueuedMessage,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Queue depth and lifetime counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueMetrics {
    pub message_count: usize,
    pub dead_letter_count: usize,
    pub published: u64,
    pub consumed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
    pub connected: bool,
}
