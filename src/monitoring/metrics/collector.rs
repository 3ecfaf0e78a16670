//! Metrics collector implementation for recording metrics

use super::types::{
    DailyCounters, MAX_WINDOWS, MetricsStorage, PerformanceWindow, THROUGHPUT_WINDOWS,
};
use crate::utils::bounded::{BoundedPush, tail};
use crate::utils::task::PeriodicTask;
use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const WINDOW_INTERVAL: Duration = Duration::from_secs(60);

/// Collects processing counters for the pipeline
#[derive(Debug)]
pub struct MetricsCollector {
    /// All metrics storage consolidated into a single lock
    pub(super) storage: RwLock<MetricsStorage>,
    /// Whether collection is active - using AtomicBool for lock-free access
    active: AtomicBool,
    tasks: Mutex<Vec<PeriodicTask>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            storage: RwLock::new(MetricsStorage::new(today())),
            active: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start the per-minute window and the midnight reset timers
    pub fn start(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Starting metrics collection");

        let windows = Arc::clone(self);
        let midnight = Arc::clone(self);
        let mut tasks = self.tasks.lock();
        tasks.push(PeriodicTask::spawn("metrics-window", WINDOW_INTERVAL, move || {
            let collector = Arc::clone(&windows);
            async move {
                collector.collect_window();
            }
        }));
        tasks.push(PeriodicTask::spawn_scheduled(
            "metrics-midnight-reset",
            until_next_local_midnight,
            move || {
                let collector = Arc::clone(&midnight);
                async move {
                    collector.roll_day(today());
                }
            },
        ));
    }

    pub async fn stop(&self) {
        debug!("Stopping metrics collection");
        self.active.store(false, Ordering::Release);
        let tasks: Vec<PeriodicTask> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.stop().await;
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// A message delivered in `elapsed`
    pub fn record_processed(&self, elapsed: Duration) {
        let mut storage = self.storage.write();
        storage.roll_day(today());
        storage.daily.processed += 1;
        storage.minute.processed += 1;
        storage.push_processing_time(elapsed);
        storage.last_processed_at = Some(Utc::now());
    }

    pub fn record_error(&self) {
        let mut storage = self.storage.write();
        storage.roll_day(today());
        storage.daily.errors += 1;
        storage.minute.errors += 1;
    }

    pub fn record_rate_limit_hit(&self) {
        let mut storage = self.storage.write();
        storage.roll_day(today());
        storage.daily.rate_limit_hits += 1;
        storage.minute.rate_limit_hits += 1;
    }

    /// Close the current minute into a performance window
    pub fn collect_window(&self) -> PerformanceWindow {
        let mut storage = self.storage.write();
        let minute = std::mem::take(&mut storage.minute);
        let window = PerformanceWindow {
            timestamp: Utc::now(),
            processed: minute.processed,
            errors: minute.errors,
            rate_limit_hits: minute.rate_limit_hits,
            average_processing_time_ms: storage.average_processing_time_ms(),
        };
        storage.windows.push_bounded(window.clone(), MAX_WINDOWS);
        window
    }

    /// Reset the daily counters when `day` differs from theirs
    pub fn roll_day(&self, day: NaiveDate) -> bool {
        let rolled = self.storage.write().roll_day(day);
        if rolled {
            info!(%day, "Daily counters reset");
        }
        rolled
    }

    pub fn daily(&self) -> DailyCounters {
        let mut storage = self.storage.write();
        storage.roll_day(today());
        storage.daily.clone()
    }

    pub fn last_processed_at(&self) -> Option<DateTime<Utc>> {
        self.storage.read().last_processed_at
    }

    /// Performance windows, oldest first
    pub fn windows(&self) -> Vec<PerformanceWindow> {
        tail(&self.storage.read().windows, MAX_WINDOWS)
    }

    pub fn processed_this_hour(&self, now: DateTime<Utc>) -> u64 {
        let hour_ago = now - chrono::Duration::hours(1);
        self.storage
            .read()
            .windows
            .iter()
            .filter(|window| window.timestamp > hour_ago)
            .map(|window| window.processed)
            .sum()
    }

    /// Processed in the most recent window
    pub fn processed_this_minute(&self) -> u64 {
        self.storage
            .read()
            .windows
            .back()
            .map(|window| window.processed)
            .unwrap_or(0)
    }

    /// Mean processed per window over the last ten windows
    pub fn throughput_per_minute(&self) -> f64 {
        let storage = self.storage.read();
        let recent = tail(&storage.windows, THROUGHPUT_WINDOWS);
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(|window| window.processed).sum::<u64>() as f64 / recent.len() as f64
    }

    pub fn average_processing_time_ms(&self) -> f64 {
        self.storage.read().average_processing_time_ms()
    }

    /// Errors as a percentage of processed messages today
    pub fn error_rate(&self) -> f64 {
        let daily = self.daily();
        percent(daily.errors, daily.processed)
    }

    /// Rate-limit hits as a percentage of processed messages today
    pub fn rate_limit_hit_rate(&self) -> f64 {
        let daily = self.daily();
        percent(daily.rate_limit_hits, daily.processed)
    }

    /// Clear every counter, window and timing
    pub fn reset(&self) {
        *self.storage.write() = MetricsStorage::new(today());
        info!("Metrics reset successfully");
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn until_next_local_midnight() -> Duration {
    let now = Local::now();
    now.date_naive()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .and_then(|midnight| (midnight - now).to_std().ok())
        .unwrap_or(Duration::from_secs(3_600))
}
