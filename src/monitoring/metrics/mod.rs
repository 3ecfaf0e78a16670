//! Pipeline metrics
//!
//! [`MetricsCollector`] keeps daily counters, per-minute performance windows and recent
//! processing times; [`MetricsCollector::snapshot`] rolls them up with queue, token bucket
//! and retry figures into [`PipelineMetrics`] carrying the health verdict.

mod aggregate;
mod collector;
mod types;


pub use aggregate::SnapshotInputs;
pub use collector::MetricsCollector;
pub use types::{DailyCounters, PerformanceWindow, PipelineMetrics};
