//! Health types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered from best to worst, so the worst of several verdicts is their maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Verdict with one message per violated rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub issues: Vec<String>,
}

impl HealthReport {
    pub(super) fn raise(&mut self, status: HealthStatus, issue: String) {
        self.status = self.status.max(status);
        self.issues.push(issue);
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Figures the verdict is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub processor_running: bool,
    pub queue_size: usize,
    /// Errors as a percentage of processed messages
    pub error_rate: f64,
    /// Token bucket occupancy between 0 and 1
    pub token_ratio: f64,
    pub average_processing_time_ms: f64,
}
