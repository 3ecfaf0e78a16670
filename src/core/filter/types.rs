//! Filter types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audio above this size is always rejected, whatever the subject allows
pub const GLOBAL_MAX_AUDIO_BYTES: u64 = 25_165_824;

/// Reaction sent back for oversize audio
pub const OVERSIZE_AUDIO_MARKER: &str = "⛔";

/// Message kinds recognised under `message`, in detection order
pub(super) const KNOWN_KINDS: &[&str] = &[
    "conversation",
    "extendedTextMessage",
    "audioMessage",
    "imageMessage",
    "videoMessage",
    "documentMessage",
    "contactMessage",
    "locationMessage",
    "listResponseMessage",
    "templateButtonReplyMessage",
    "viewOnceMessageV2",
    "documentWithCaptionMessage",
    "stickerMessage",
    "ptvMessage",
];

pub(super) const AUDIO_KIND: &str = "audioMessage";
pub(super) const UNKNOWN_KIND: &str = "unknown";

pub(super) const DEFAULT_MIN_DURATION_SECS: f64 = 3.0;
pub(super) const DEFAULT_MAX_DURATION_SECS: f64 = 300.0;

/// Outcome of one admissibility check
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterDecision {
    pub allowed: bool,
    /// Why the message was blocked
    pub reason: Option<String>,
    pub subject: String,
    /// Primary kind detected in the event
    pub message_kind: String,
    /// Sender should get the oversize marker back
    pub should_reply_to_oversize_audio: bool,
    pub oversize_message: Option<String>,
    /// Sender should get the invalid-duration message back
    pub should_reply_to_invalid_duration: bool,
    pub invalid_duration_message: Option<String>,
    /// Chat the replies go to
    pub remote_jid: Option<String>,
    /// Rule that blocked the message: `messageType`, `audioSize`, `duration`, `text` or `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
}

impl FilterDecision {
    pub(super) fn allow(subject: &str, kind: &str) -> Self {
        Self {
            allowed: true,
            reason: None,
            subject: subject.to_string(),
            message_kind: kind.to_string(),
            should_reply_to_oversize_audio: false,
            oversize_message: None,
            should_reply_to_invalid_duration: false,
            invalid_duration_message: None,
            remote_jid: None,
            filter_type: None,
        }
    }

    pub(super) fn block(subject: &str, kind: &str, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            ..Self::allow(subject, kind)
        }
    }

    pub(super) fn with_remote_jid(mut self, remote_jid: Option<&str>) -> Self {
        self.remote_jid = remote_jid.map(str::to_string);
        self
    }

    pub(super) fn by(mut self, filter_type: &str) -> Self {
        self.filter_type = Some(filter_type.to_string());
        self
    }

    /// `tooShort` or `tooLong` for duration blocks
    pub fn duration_verdict(&self) -> Option<&'static str> {
        if self.filter_type.as_deref() != Some("duration") {
            return None;
        }
        let reason = self.reason.as_deref().unwrap_or_default();
        Some(if reason.contains("below minimum") { "tooShort" } else { "tooLong" })
    }

    pub fn reason_or_default(&self) -> &str {
        self.reason.as_deref().unwrap_or("allowed")
    }
}

/// Audio duration counters for one subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub too_short: u64,
    pub too_long: u64,
    pub processed: u64,
    pub total_filtered: u64,
    pub last_reset: DateTime<Utc>,
}

impl Default for FilterStats {
    fn default() -> Self {
        Self {
            too_short: 0,
            too_long: 0,
            processed: 0,
            total_filtered: 0,
            last_reset: Utc::now(),
        }
    }
}

/// Stats with derived rates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStatsReport {
    pub subject: String,
    pub stats: FilterStats,
    /// Percentage of decided audio that was filtered
    pub filter_efficiency: f64,
    /// Decisions per hour since the last reset
    pub hourly_rate: Option<f64>,
}

/// Fields pulled out of a raw event
#[derive(Debug, Default)]
pub(super) struct MessageInfo {
    pub(super) kind: String,
    pub(super) is_text: bool,
    pub(super) text: Option<String>,
    pub(super) audio_size: Option<u64>,
    pub(super) audio_duration: Option<f64>,
    pub(super) remote_jid: Option<String>,
}
