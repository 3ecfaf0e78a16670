//! Interval-based token bucket

use super::types::{BucketState, TokenBucketStatus};
use crate::config::models::rate_limit::TokenBucketConfig;
use chrono::Utc;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Token bucket refilled lazily in whole intervals
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u32,
    refill_rate: u32,
    refill_interval: Duration,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(config: &TokenBucketConfig) -> Self {
        Self {
            capacity: config.capacity,
            refill_rate: config.refill_rate,
            refill_interval: config.refill_interval().max(Duration::from_millis(1)),
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
                last_refill_at: Utc::now(),
            }),
        }
    }

    /// Take `amount` tokens if available; a rejection leaves the bucket untouched
    pub fn consume(&self, amount: u32) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);

        if state.tokens >= amount {
            state.tokens -= amount;
            true
        } else {
            debug!(
                tokens = state.tokens,
                requested = amount,
                "Token bucket rejected request"
            );
            false
        }
    }

    pub fn status(&self) -> TokenBucketStatus {
        let mut state = self.state.lock();
        self.refill(&mut state);

        TokenBucketStatus {
            tokens: state.tokens,
            capacity: self.capacity,
            refill_rate: self.refill_rate,
            refill_interval_ms: self.refill_interval.as_millis() as u64,
            last_refill: state.last_refill_at,
        }
    }

    /// Refill to capacity and restart the interval clock
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tokens = self.capacity;
        state.last_refill = Instant::now();
        state.last_refill_at = Utc::now();
        debug!(capacity = self.capacity, "Token bucket reset");
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed();
        let interval_nanos = self.refill_interval.as_nanos();
        let intervals = elapsed.as_nanos() / interval_nanos;
        if intervals == 0 {
            return;
        }

        let added = intervals.saturating_mul(self.refill_rate as u128);
        let tokens = (state.tokens as u128).saturating_add(added);
        state.tokens = tokens.min(self.capacity as u128) as u32;

        // Advance by whole intervals only so the partial interval carries over
        let advanced = interval_nanos.saturating_mul(intervals);
        let advanced = Duration::from_nanos(advanced.min(u64::MAX as u128) as u64);
        state.last_refill += advanced;
        state.last_refill_at = Utc::now();
    }
}
