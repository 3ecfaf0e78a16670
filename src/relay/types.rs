//! Facade input and outcome types

use crate::config::models::filter::MessageFilter;
use crate::core::filter::FilterDecision;
use crate::core::queue::AudioMetadata;
use crate::core::webhooks::WebhookResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One raw inbound message event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    /// Subject the event belongs to
    pub instance: String,
    pub event: Value,
    /// Rules for this subject; `None` admits every kind
    #[serde(default)]
    pub filter: Option<MessageFilter>,
    /// Location of already-stored audio, forwarded with the event
    #[serde(default)]
    pub audio: Option<AudioMetadata>,
}

impl InboundEvent {
    pub fn new(instance: impl Into<String>, event: Value) -> Self {
        Self {
            instance: instance.into(),
            event,
            filter: None,
            audio: None,
        }
    }

    pub fn with_filter(mut self, filter: MessageFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_audio(mut self, audio: AudioMetadata) -> Self {
        self.audio = Some(audio);
        self
    }
}

/// What happened to an ingested event
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Blocked by the subject's filter
    Filtered(FilterDecision),
    /// Published to the durable queue
    Enqueued { id: String },
    /// Sent straight to the main webhook; failures may be parked for retry
    Delivered(WebhookResult),
}

impl IngestOutcome {
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }

    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued { .. })
    }
}
