//! Metrics types

use crate::monitoring::health::HealthStatus;
use crate::utils::bounded::BoundedPush;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Per-minute windows kept (one hour)
pub(super) const MAX_WINDOWS: usize = 60;

/// Processing times kept for the latency average
pub(super) const MAX_PROCESSING_TIMES: usize = 1_000;

/// Windows averaged for the throughput figure
pub(super) const THROUGHPUT_WINDOWS: usize = 10;

/// One minute of activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceWindow {
    pub timestamp: DateTime<Utc>,
    pub processed: u64,
    pub errors: u64,
    pub rate_limit_hits: u64,
    pub average_processing_time_ms: f64,
}

/// Counters of the current local day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCounters {
    pub processed: u64,
    pub errors: u64,
    pub rate_limit_hits: u64,
    pub day: NaiveDate,
}

impl DailyCounters {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            processed: 0,
            errors: 0,
            rate_limit_hits: 0,
            day,
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct MinuteCounters {
    pub(super) processed: u64,
    pub(super) errors: u64,
    pub(super) rate_limit_hits: u64,
}

#[derive(Debug)]
pub(super) struct MetricsStorage {
    pub(super) daily: DailyCounters,
    pub(super) minute: MinuteCounters,
    pub(super) windows: VecDeque<PerformanceWindow>,
    pub(super) processing_times: VecDeque<f64>,
    pub(super) last_processed_at: Option<DateTime<Utc>>,
}

impl MetricsStorage {
    pub(super) fn new(day: NaiveDate) -> Self {
        Self {
            daily: DailyCounters::new(day),
            minute: MinuteCounters::default(),
            windows: VecDeque::with_capacity(MAX_WINDOWS),
            processing_times: VecDeque::with_capacity(MAX_PROCESSING_TIMES),
            last_processed_at: None,
        }
    }

    pub(super) fn roll_day(&mut self, today: NaiveDate) -> bool {
        if self.daily.day == today {
            return false;
        }
        self.daily = DailyCounters::new(today);
        true
    }

    pub(super) fn push_processing_time(&mut self, elapsed: Duration) {
        self.processing_times
            .push_bounded(elapsed.as_secs_f64() * 1_000.0, MAX_PROCESSING_TIMES);
    }

    pub(super) fn average_processing_time_ms(&self) -> f64 {
        if self.processing_times.is_empty() {
            return 0.0;
        }
        self.processing_times.iter().sum::<f64>() / self.processing_times.len() as f64
    }
}

/// Rolled-up view of the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetrics {
    pub queue_size: usize,
    pub is_processor_running: bool,

    pub processed_today: u64,
    pub processed_this_hour: u64,
    pub processed_this_minute: u64,

    pub average_processing_time_ms: f64,
    pub throughput_per_minute: f64,

    pub total_errors: u64,
    /// Percent of processed
    pub error_rate: f64,

    pub rate_limit_hits: u64,
    /// Percent of processed
    pub rate_limit_hit_rate: f64,

    pub tokens_available: u32,
    pub token_capacity: u32,
    /// e.g. `5/1000ms`
    pub refill_rate: String,

    pub pending_retries: usize,
    pub total_retry_attempts: u64,
    pub average_retries_per_message: f64,

    pub last_processed_at: Option<DateTime<Utc>>,
    pub metrics_generated_at: DateTime<Utc>,

    pub health_status: HealthStatus,
    pub health_issues: Vec<String>,
}
