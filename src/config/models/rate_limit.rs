//! Admission control configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token bucket shared by every consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Maximum tokens held
    #[serde(default = "default_bucket_capacity")]
    pub capacity: u32,
    /// Tokens added per elapsed interval
    #[serde(default = "default_refill_rate")]
    pub refill_rate: u32,
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            capacity: default_bucket_capacity(),
            refill_rate: default_refill_rate(),
            refill_interval_ms: default_refill_interval_ms(),
        }
    }
}

impl TokenBucketConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }
}
