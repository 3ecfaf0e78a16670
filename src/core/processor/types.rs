//! Queue processor types

use crate::core::rate_limiter::TokenBucketStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle: `Stopped -> Initializing -> Running -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorState {
    #[default]
    Stopped,
    /// Connecting, or connected and waiting for `start`
    Initializing,
    Running,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Initializing => "initializing",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}

/// Processor snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorStats {
    pub is_running: bool,
    pub state: ProcessorState,
    pub processed_today: u64,
    pub rate_limit_hits: u64,
    pub errors: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub queue_size: usize,
    pub token_bucket_status: TokenBucketStatus,
}
