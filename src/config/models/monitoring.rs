//! Health threshold configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Thresholds feeding the health verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Queue depth that raises a warning
    #[serde(default = "default_queue_warning")]
    pub queue_warning: usize,
    /// Queue depth that is critical
    #[serde(default = "default_queue_critical")]
    pub queue_critical: usize,
    /// Error rate in percent
    #[serde(default = "default_error_rate_warning")]
    pub error_rate_warning: f64,
    #[serde(default = "default_error_rate_critical")]
    pub error_rate_critical: f64,
    /// Token bucket occupancy below which a warning is raised
    #[serde(default = "default_token_ratio_warning")]
    pub token_ratio_warning: f64,
    /// Average processing latency that raises a warning
    #[serde(default = "default_latency_warning_ms")]
    pub latency_warning_ms: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            queue_warning: default_queue_warning(),
            queue_critical: default_queue_critical(),
            error_rate_warning: default_error_rate_warning(),
            error_rate_critical: default_error_rate_critical(),
            token_ratio_warning: default_token_ratio_warning(),
            latency_warning_ms: default_latency_warning_ms(),
        }
    }
}
