//! Filter engine

use super::extract::message_info;
use super::stats::FilterStatsTracker;
use super::types::{
    AUDIO_KIND, DEFAULT_MAX_DURATION_SECS, DEFAULT_MIN_DURATION_SECS, FilterDecision,
    GLOBAL_MAX_AUDIO_BYTES, MessageInfo, OVERSIZE_AUDIO_MARKER,
};
use crate::config::models::filter::{AudioFilterConfig, MessageFilter, TextFilters};
use crate::utils::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Decides whether an inbound event may be relayed
pub struct FilterEngine {
    stats: Arc<FilterStatsTracker>,
    global: AudioFilterConfig,
    /// Compiled patterns; `None` marks a pattern that failed to compile
    patterns: Mutex<LruCache<String, Option<Regex>>>,
}

impl FilterEngine {
    pub fn new(stats: Arc<FilterStatsTracker>, global: AudioFilterConfig) -> Self {
        let capacity = NonZeroUsize::new(global.regex_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            stats,
            global,
            patterns: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn stats(&self) -> &Arc<FilterStatsTracker> {
        &self.stats
    }

    /// Evaluate `event` against `filter`; any internal error blocks the event
    pub fn decide(&self, event: &Value, filter: &MessageFilter, subject: &str) -> FilterDecision {
        match self.evaluate(event, filter, subject) {
            Ok(decision) => {
                if decision.allowed {
                    debug!(instance = %subject, kind = %decision.message_kind, "Message allowed");
                } else {
                    debug!(
                        instance = %subject,
                        kind = %decision.message_kind,
                        reason = decision.reason_or_default(),
                        "Message blocked"
                    );
                }
                decision
            }
            Err(e) => {
                error!(instance = %subject, error = %e, "Error in message filter");
                FilterDecision::block(subject, "unknown", e.to_string()).by("error")
            }
        }
    }

    fn evaluate(&self, event: &Value, filter: &MessageFilter, subject: &str) -> Result<FilterDecision> {
        let info = message_info(event)?;
        let jid = info.remote_jid.as_deref();

        if let Some(reason) = kind_filter(&info.kind, filter) {
            return Ok(FilterDecision::block(subject, &info.kind, reason)
                .with_remote_jid(jid)
                .by("messageType"));
        }

        if info.kind == AUDIO_KIND {
            if let Some(decision) = size_filter(&info, subject) {
                return Ok(decision);
            }
            if let Some(decision) = self.duration_filter(&info, filter, subject) {
                return Ok(decision);
            }
        }

        if info.is_text {
            if let (Some(text), Some(lists)) = (info.text.as_deref(), filter.text_filters.as_ref()) {
                if !text.is_empty() {
                    if let Some(reason) = self.text_filter(text, lists) {
                        return Ok(FilterDecision::block(subject, &info.kind, reason)
                            .with_remote_jid(jid)
                            .by("text"));
                    }
                }
            }
        }

        Ok(FilterDecision::allow(subject, &info.kind).with_remote_jid(jid))
    }

    fn duration_filter(
        &self,
        info: &MessageInfo,
        filter: &MessageFilter,
        subject: &str,
    ) -> Option<FilterDecision> {
        let config = filter.audio_duration_filter.as_ref().filter(|c| c.enabled)?;
        let duration = info.audio_duration?;
        let jid = info.remote_jid.as_deref();

        let min = config.min_duration_seconds.unwrap_or(DEFAULT_MIN_DURATION_SECS);
        let max = config.max_duration_seconds.unwrap_or(DEFAULT_MAX_DURATION_SECS);

        if duration < min {
            self.stats.increment_too_short(subject);
            return Some(
                FilterDecision::block(
                    subject,
                    &info.kind,
                    format!("Audio duration {}s is below minimum {}s", duration, min),
                )
                .with_remote_jid(jid)
                .by("duration"),
            );
        }

        if duration > max {
            self.stats.increment_too_long(subject);

            let global_max = self.global.max_duration_secs;
            if duration > global_max {
                let mut decision = FilterDecision::block(
                    subject,
                    &info.kind,
                    format!("Audio duration {}s exceeds global maximum {}s", duration, global_max),
                )
                .with_remote_jid(jid)
                .by("duration");
                decision.should_reply_to_invalid_duration = true;
                decision.invalid_duration_message = Some(self.global.invalid_duration_message.clone());
                return Some(decision);
            }

            // Instance ceiling only: dropped without a reply
            return Some(
                FilterDecision::block(
                    subject,
                    &info.kind,
                    format!("Audio duration {}s exceeds instance maximum {}s", duration, max),
                )
                .with_remote_jid(jid)
                .by("duration"),
            );
        }

        self.stats.increment_processed(subject);
        None
    }

    fn text_filter(&self, text: &str, lists: &TextFilters) -> Option<String> {
        let content = text.to_lowercase();

        if let Some(word) = lists
            .blocked_words
            .iter()
            .find(|word| content.contains(&word.to_lowercase()))
        {
            return Some(format!("Text contains blocked word: '{}'", word));
        }

        if let Some(pattern) = lists
            .blocked_patterns
            .iter()
            .find(|pattern| self.matches(pattern, &content))
        {
            return Some(format!("Text matches blocked pattern: '{}'", pattern));
        }

        if !lists.allowed_words.is_empty()
            && !lists
                .allowed_words
                .iter()
                .any(|word| content.contains(&word.to_lowercase()))
        {
            return Some("Text does not contain any allowed words".to_string());
        }

        if !lists.allowed_patterns.is_empty()
            && !lists
                .allowed_patterns
                .iter()
                .any(|pattern| self.matches(pattern, &content))
        {
            return Some("Text does not match any allowed patterns".to_string());
        }

        None
    }

    /// Case-insensitive match; a pattern that does not compile never matches
    fn matches(&self, pattern: &str, content: &str) -> bool {
        let mut cache = self.patterns.lock();
        if let Some(compiled) = cache.get(pattern) {
            return compiled.as_ref().is_some_and(|re| re.is_match(content));
        }

        let compiled = match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "Invalid regex pattern");
                None
            }
        };
        let matched = compiled.as_ref().is_some_and(|re| re.is_match(content));
        cache.put(pattern.to_string(), compiled);
        matched
    }
}

fn kind_filter(kind: &str, filter: &MessageFilter) -> Option<String> {
    if filter.exclude_message_types.iter().any(|k| k == kind) {
        return Some(format!("Message type '{}' is in exclude list", kind));
    }
    if !filter.message_types.is_empty() && !filter.message_types.iter().any(|k| k == kind) {
        return Some(format!("Message type '{}' is not in allowed list", kind));
    }
    None
}

fn size_filter(info: &MessageInfo, subject: &str) -> Option<FilterDecision> {
    let size = info.audio_size?;
    if size <= GLOBAL_MAX_AUDIO_BYTES {
        return None;
    }

    let mut decision = FilterDecision::block(
        subject,
        &info.kind,
        format!(
            "Audio size {} bytes exceeds global limit {} bytes",
            size, GLOBAL_MAX_AUDIO_BYTES
        ),
    )
    .with_remote_jid(info.remote_jid.as_deref())
    .by("audioSize");
    decision.should_reply_to_oversize_audio = true;
    decision.oversize_message = Some(OVERSIZE_AUDIO_MARKER.to_string());
    Some(decision)
}
