//! Feedback session types

use crate::utils::error::{RelayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal that a long-running operation on a message has begun
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub instance: String,
    pub chat_id: String,
    pub message_id: String,
    #[serde(default)]
    pub process_type: Option<String>,
}

impl StartRequest {
    pub fn new(instance: impl Into<String>, chat_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            chat_id: chat_id.into(),
            message_id: message_id.into(),
            process_type: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_target(&self.instance, &self.chat_id, &self.message_id)
    }

    pub fn session_id(&self) -> String {
        session_id(&self.instance, &self.chat_id, &self.message_id)
    }
}

/// How the operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishStatus {
    Success,
    Error,
    Aborted,
}

/// Signal that the operation has ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub instance: String,
    pub chat_id: String,
    pub message_id: String,
    pub status: FinishStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Text sent to the chat after the terminal indicator
    #[serde(default)]
    pub text: Option<String>,
}

impl FinishRequest {
    pub fn new(
        instance: impl Into<String>,
        chat_id: impl Into<String>,
        message_id: impl Into<String>,
        status: FinishStatus,
    ) -> Self {
        Self {
            instance: instance.into(),
            chat_id: chat_id.into(),
            message_id: message_id.into(),
            status,
            error_message: None,
            text: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_target(&self.instance, &self.chat_id, &self.message_id)
    }

    pub fn session_id(&self) -> String {
        session_id(&self.instance, &self.chat_id, &self.message_id)
    }
}

/// Message a reaction is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: String,
    pub id: String,
    pub from_me: bool,
}

/// Public view of an active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub instance: String,
    pub chat_id: String,
    pub message_id: String,
    pub process_type: Option<String>,
    pub started_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
    pub current_indicator_index: usize,
}

impl SessionInfo {
    pub fn message_key(&self) -> MessageKey {
        MessageKey {
            remote_jid: self.chat_id.clone(),
            id: self.message_id.clone(),
            from_me: false,
        }
    }
}

/// Session counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub active: usize,
    pub started: u64,
    pub finished: u64,
    pub timed_out: u64,
    /// Mean lifetime of ended sessions
    pub average_duration_ms: f64,
}

/// `instance:chat:message`
pub fn session_id(instance: &str, chat_id: &str, message_id: &str) -> String {
    format!("{}:{}:{}", instance, chat_id, message_id)
}

fn validate_target(instance: &str, chat_id: &str, message_id: &str) -> Result<()> {
    if instance.trim().is_empty() {
        return Err(RelayError::validation("instance is required"));
    }
    if chat_id.trim().is_empty() {
        return Err(RelayError::validation("chatId is required"));
    }
    if message_id.trim().is_empty() {
        return Err(RelayError::validation("messageId is required"));
    }
    if !chat_id.contains('@') {
        return Err(RelayError::validation(format!(
            "chatId must be a full chat address containing '@', got '{}'",
            chat_id
        )));
    }
    Ok(())
}
