//! Outbound capability used to post indicators

use super::types::MessageKey;
use crate::config::models::feedback::FeedbackConfig;
use crate::config::models::default_user_agent;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

/// Posts reactions and text back to a chat
#[async_trait]
pub trait FeedbackSender: Send + Sync {
    async fn send_reaction(&self, instance: &str, key: &MessageKey, indicator: &str) -> Result<()>;

    async fn send_text(&self, instance: &str, chat_id: &str, text: &str) -> Result<()>;
}

/// Sender used when no messaging API is configured
#[derive(Debug, Default)]
pub struct NoopFeedbackSender;

#[async_trait]
impl FeedbackSender for NoopFeedbackSender {
    async fn send_reaction(&self, instance: &str, key: &MessageKey, indicator: &str) -> Result<()> {
        debug!(instance, message_id = %key.id, indicator, "Feedback sender not configured, reaction dropped");
        Ok(())
    }

    async fn send_text(&self, instance: &str, chat_id: &str, _text: &str) -> Result<()> {
        debug!(instance, chat_id, "Feedback sender not configured, text dropped");
        Ok(())
    }
}

/// Posts to the messaging API's `sendReaction` and `sendText` endpoints
#[derive(Debug, Clone)]
pub struct HttpFeedbackSender {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpFeedbackSender {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, config: &FeedbackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.outbound_timeout())
            .user_agent(default_user_agent())
            .build()
            .map_err(|e| RelayError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Built from `outbound_url`; `None` when it is not set
    pub fn from_config(config: &FeedbackConfig) -> Result<Option<Self>> {
        match config.outbound_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => Self::new(url, config.outbound_api_key.clone(), config).map(Some),
            None => Ok(None),
        }
    }

    async fn post(&self, route: &str, instance: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}/message/{}/{}", self.base_url, route, instance);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RelayError::delivery(format!("{} returned status {}", route, status.as_u16())))
        }
    }
}

#[async_trait]
impl FeedbackSender for HttpFeedbackSender {
    async fn send_reaction(&self, instance: &str, key: &MessageKey, indicator: &str) -> Result<()> {
        let body = json!({
            "key": key,
            "reaction": indicator,
        });
        self.post("sendReaction", instance, body).await
    }

    async fn send_text(&self, instance: &str, chat_id: &str, text: &str) -> Result<()> {
        let body = json!({
            "number": chat_id,
            "text": text,
        });
        self.post("sendText", instance, body).await
    }
}
