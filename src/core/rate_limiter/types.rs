//! Token bucket types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the bucket after a lazy refill
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenBucketStatus {
    pub tokens: u32,
    pub capacity: u32,
    /// Tokens added per interval
    pub refill_rate: u32,
    pub refill_interval_ms: u64,
    pub last_refill: DateTime<Utc>,
}

impl TokenBucketStatus {
    /// Occupancy between 0 and 1
    pub fn ratio(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.tokens as f64 / self.capacity as f64
    }
}

#[derive(Debug)]
pub(super) struct BucketState {
    pub(super) tokens: u32,
    pub(super) last_refill: tokio::time::Instant,
    pub(super) last_refill_at: DateTime<Utc>,
}
