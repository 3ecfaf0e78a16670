//! Processing feedback configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Processing feedback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Interval between progress indicators
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,
    /// Sessions still open after this are timed out
    #[serde(default = "default_feedback_timeout_secs")]
    pub timeout_secs: u64,
    /// Indicators cycled while a session is active
    #[serde(default = "default_progress_indicators")]
    pub progress_indicators: Vec<String>,
    #[serde(default = "default_success_indicator")]
    pub success_indicator: String,
    #[serde(default = "default_error_indicator")]
    pub error_indicator: String,
    #[serde(default = "default_aborted_indicator")]
    pub aborted_indicator: String,
    #[serde(default = "default_timeout_indicator")]
    pub timeout_indicator: String,
    /// Base URL of the messaging API used to post indicators
    #[serde(default)]
    pub outbound_url: Option<String>,
    #[serde(default)]
    pub outbound_api_key: Option<String>,
    #[serde(default = "default_monitoring_timeout_ms")]
    pub outbound_timeout_ms: u64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: default_loop_interval_ms(),
            timeout_secs: default_feedback_timeout_secs(),
            progress_indicators: default_progress_indicators(),
            success_indicator: default_success_indicator(),
            error_indicator: default_error_indicator(),
            aborted_indicator: default_aborted_indicator(),
            timeout_indicator: default_timeout_indicator(),
            outbound_url: None,
            outbound_api_key: None,
            outbound_timeout_ms: default_monitoring_timeout_ms(),
        }
    }
}

impl FeedbackConfig {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_millis(self.outbound_timeout_ms)
    }
}
