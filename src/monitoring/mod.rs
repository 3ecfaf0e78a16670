//! Monitoring
//!
//! Processing metrics with per-minute windows, and the health verdict derived from them.

pub mod health;
pub mod metrics;

pub use health::{HealthReport, HealthStatus};
pub use metrics::{MetricsCollector, PipelineMetrics};
