//! Configuration data models
//!
//! This module defines all configuration structures used throughout the relay.

pub mod feedback;
pub mod filter;
pub mod logging;
pub mod monitoring;
pub mod queue;
pub mod rate_limit;
pub mod relay;
pub mod server;
pub mod webhook;

pub use feedback::*;
pub use filter::*;
pub use logging::*;
pub use monitoring::*;
pub use queue::*;
pub use rate_limit::*;
pub use relay::*;
pub use server::*;
pub use webhook::*;

pub fn default_true() -> bool {
    true
}

pub fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

pub fn default_stream() -> String {
    "relay:messages".to_string()
}

pub fn default_consumer_group() -> String {
    "relay-processors".to_string()
}

pub fn default_consumer_name() -> String {
    format!("relay-{}", std::process::id())
}

pub fn default_dead_letter_stream() -> String {
    "relay:messages:dead".to_string()
}

/// Broker-level redelivery cap
pub fn default_max_redeliveries() -> u32 {
    3
}

pub fn default_max_length() -> usize {
    100_000
}

pub fn default_batch_size() -> usize {
    10
}

pub fn default_block_timeout_ms() -> u64 {
    1000
}

pub fn default_connect_timeout_ms() -> u64 {
    5000
}

pub fn default_operation_timeout_ms() -> u64 {
    5000
}

pub fn default_claim_idle_ms() -> u64 {
    60_000
}

pub fn default_rate_limit_backoff_ms() -> u64 {
    1000
}

pub fn default_stats_interval_secs() -> u64 {
    300
}

pub fn default_bucket_capacity() -> u32 {
    60
}

pub fn default_refill_rate() -> u32 {
    1
}

pub fn default_refill_interval_ms() -> u64 {
    1000
}

pub fn default_main_timeout_ms() -> u64 {
    30_000
}

pub fn default_monitoring_timeout_ms() -> u64 {
    15_000
}

pub fn default_max_retries() -> u32 {
    5
}

pub fn default_base_delay_ms() -> u64 {
    1000
}

pub fn default_max_delay_ms() -> u64 {
    300_000
}

pub fn default_backoff_factor() -> f64 {
    2.0
}

pub fn default_retryable_status_codes() -> Vec<u16> {
    vec![408, 429, 500, 502, 503, 504]
}

pub fn default_sweep_interval_ms() -> u64 {
    5000
}

pub fn default_log_max_entries() -> usize {
    1000
}

pub fn default_log_max_age_secs() -> u64 {
    3600
}

pub fn default_global_max_duration_secs() -> f64 {
    7200.0
}

pub fn default_invalid_duration_message() -> String {
    "Audio exceeds the 2 hour limit".to_string()
}

pub fn default_regex_cache_size() -> usize {
    256
}

pub fn default_queue_warning() -> usize {
    5000
}

pub fn default_queue_critical() -> usize {
    10_000
}

pub fn default_error_rate_warning() -> f64 {
    10.0
}

pub fn default_error_rate_critical() -> f64 {
    25.0
}

pub fn default_token_ratio_warning() -> f64 {
    0.10
}

pub fn default_latency_warning_ms() -> f64 {
    5000.0
}

pub fn default_loop_interval_ms() -> u64 {
    3000
}

pub fn default_feedback_timeout_secs() -> u64 {
    600
}

pub fn default_progress_indicators() -> Vec<String> {
    vec!["🔄".to_string(), "⏳".to_string()]
}

pub fn default_success_indicator() -> String {
    "✅".to_string()
}

pub fn default_error_indicator() -> String {
    "❌".to_string()
}

pub fn default_aborted_indicator() -> String {
    "⚠️".to_string()
}

pub fn default_timeout_indicator() -> String {
    "🤷".to_string()
}

pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
