//! Message filter configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Per-subject admissibility rules
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageFilter {
    /// Allowed message kinds; empty admits every kind
    #[serde(default)]
    pub message_types: Vec<String>,
    /// Excluded message kinds, checked before the allow list
    #[serde(default)]
    pub exclude_message_types: Vec<String>,
    #[serde(default)]
    pub text_filters: Option<TextFilters>,
    #[serde(default)]
    pub audio_duration_filter: Option<AudioDurationFilter>,
}

/// Word and pattern lists applied to text messages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TextFilters {
    #[serde(default)]
    pub allowed_words: Vec<String>,
    #[serde(default)]
    pub blocked_words: Vec<String>,
    #[serde(default)]
    pub allowed_patterns: Vec<String>,
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
}

/// Audio duration bounds for one subject
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioDurationFilter {
    #[serde(default)]
    pub enabled: bool,
    /// Defaults to 3 seconds when unset
    #[serde(default)]
    pub min_duration_seconds: Option<f64>,
    /// Defaults to 300 seconds when unset
    #[serde(default)]
    pub max_duration_seconds: Option<f64>,
}

impl MessageFilter {
    /// Rules applied to subjects without their own configuration: audio and
    /// slash commands only, with 3s to 300s audio
    pub fn default_rules() -> Self {
        Self {
            message_types: vec!["audioMessage".to_string(), "conversation".to_string()],
            exclude_message_types: Vec::new(),
            text_filters: Some(TextFilters {
                allowed_patterns: vec![r"^[/\\]".to_string()],
                ..TextFilters::default()
            }),
            audio_duration_filter: Some(AudioDurationFilter {
                enabled: true,
                min_duration_seconds: Some(3.0),
                max_duration_seconds: Some(300.0),
            }),
        }
    }
}

/// Global audio limits, independent of any subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFilterConfig {
    /// Hard duration ceiling; exceeding it requests an invalid-duration reply
    #[serde(default = "default_global_max_duration_secs")]
    pub max_duration_secs: f64,
    #[serde(default = "default_invalid_duration_message")]
    pub invalid_duration_message: String,
    /// Compiled regex cache capacity
    #[serde(default = "default_regex_cache_size")]
    pub regex_cache_size: usize,
}

impl Default for AudioFilterConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_global_max_duration_secs(),
            invalid_duration_message: default_invalid_duration_message(),
            regex_cache_size: default_regex_cache_size(),
        }
    }
}
