//! Per-subject audio filter counters

use super::types::{FilterStats, FilterStatsReport};
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::{debug, info};

/// Counters are created on first use and only go up until reset
#[derive(Debug, Default)]
pub struct FilterStatsTracker {
    stats: DashMap<String, FilterStats>,
}

impl FilterStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_too_short(&self, subject: &str) {
        let mut entry = self.stats.entry(subject.to_string()).or_default();
        entry.too_short += 1;
        entry.total_filtered += 1;
        debug!(instance = %subject, total = entry.too_short, "Audio too short");
    }

    pub fn increment_too_long(&self, subject: &str) {
        let mut entry = self.stats.entry(subject.to_string()).or_default();
        entry.too_long += 1;
        entry.total_filtered += 1;
        debug!(instance = %subject, total = entry.too_long, "Audio too long");
    }

    pub fn increment_processed(&self, subject: &str) {
        let mut entry = self.stats.entry(subject.to_string()).or_default();
        entry.processed += 1;
        debug!(instance = %subject, total = entry.processed, "Audio processed");
    }

    /// Counters for one subject, zeroed if it has never been seen
    pub fn stats(&self, subject: &str) -> FilterStats {
        self.stats
            .get(subject)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn all_stats(&self) -> HashMap<String, FilterStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Reset one subject, or every subject when `None`
    pub fn reset(&self, subject: Option<&str>) {
        match subject {
            Some(subject) => {
                self.stats.insert(subject.to_string(), FilterStats::default());
                info!(instance = %subject, "Audio filter stats reset");
            }
            None => {
                self.stats.clear();
                info!("All audio filter stats reset");
            }
        }
    }

    pub fn report(&self, subject: &str) -> FilterStatsReport {
        let stats = self.stats(subject);
        let total = stats.processed + stats.total_filtered;
        let filter_efficiency = if total > 0 {
            round2(stats.total_filtered as f64 / total as f64 * 100.0)
        } else {
            0.0
        };

        let hours = (Utc::now() - stats.last_reset).num_milliseconds() as f64 / 3_600_000.0;
        let hourly_rate = (hours > 0.0 && total > 0).then(|| round2(total as f64 / hours));

        FilterStatsReport {
            subject: subject.to_string(),
            stats,
            filter_efficiency,
            hourly_rate,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
