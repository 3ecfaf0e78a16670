//! Threshold rules

use super::types::{HealthInputs, HealthReport, HealthStatus};
use crate::config::models::monitoring::HealthThresholds;

/// Apply every rule; the worst verdict wins
pub fn assess(inputs: &HealthInputs, thresholds: &HealthThresholds) -> HealthReport {
    let mut report = HealthReport::default();

    if !inputs.processor_running {
        report.raise(HealthStatus::Critical, "Queue processor is not running".to_string());
    }

    if inputs.queue_size > thresholds.queue_critical {
        report.raise(
            HealthStatus::Critical,
            format!("Queue size is very high (>{} messages)", thresholds.queue_critical),
        );
    } else if inputs.queue_size > thresholds.queue_warning {
        report.raise(
            HealthStatus::Warning,
            format!("Queue size is high (>{} messages)", thresholds.queue_warning),
        );
    }

    if inputs.error_rate > thresholds.error_rate_critical {
        report.raise(
            HealthStatus::Critical,
            format!("Very high error rate: {:.2}%", inputs.error_rate),
        );
    } else if inputs.error_rate > thresholds.error_rate_warning {
        report.raise(HealthStatus::Warning, format!("High error rate: {:.2}%", inputs.error_rate));
    }

    if inputs.token_ratio < thresholds.token_ratio_warning {
        report.raise(HealthStatus::Warning, "Token bucket is nearly empty".to_string());
    }

    if inputs.average_processing_time_ms > thresholds.latency_warning_ms {
        report.raise(
            HealthStatus::Warning,
            format!("High average processing time: {:.0}ms", inputs.average_processing_time_ms),
        );
    }

    report
}
