//! Per-message feedback sessions
//!
//! Each session owns a task that posts a progress indicator right away, cycles through
//! the configured indicators on every loop tick and expires the session once its timeout
//! passes. Finishing or force-cleaning a session cancels that task before anything else.

use super::sender::FeedbackSender;
use super::types::{FeedbackStats, FinishRequest, FinishStatus, SessionInfo, StartRequest};
use crate::config::models::feedback::FeedbackConfig;
use crate::utils::error::{RelayError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct SessionEntry {
    info: SessionInfo,
    /// Distinguishes a session from a later one that reuses its id
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    started: Instant,
}

#[derive(Debug, Default)]
struct Counters {
    started: u64,
    finished: u64,
    timed_out: u64,
    ended: u64,
    total_duration_ms: f64,
}

impl Counters {
    fn record_end(&mut self, started: Instant) {
        self.ended += 1;
        self.total_duration_ms += started.elapsed().as_secs_f64() * 1000.0;
    }
}

type Sessions = Arc<Mutex<HashMap<String, SessionEntry>>>;

/// Drives progress and terminal indicators for in-flight operations
pub struct FeedbackManager {
    config: Arc<FeedbackConfig>,
    sender: Arc<dyn FeedbackSender>,
    sessions: Sessions,
    counters: Arc<Mutex<Counters>>,
    next_generation: AtomicU64,
}

impl std::fmt::Debug for FeedbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackManager")
            .field("active", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

impl FeedbackManager {
    pub fn new(config: FeedbackConfig, sender: Arc<dyn FeedbackSender>) -> Self {
        Self {
            config: Arc::new(config),
            sender,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Mutex::new(Counters::default())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Open a session and return its id
    pub fn start(&self, request: StartRequest) -> Result<String> {
        request.validate()?;
        let id = request.session_id();

        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&id) {
            warn!(session_id = %id, "Feedback session already active");
            return Err(RelayError::conflict("Processing already in progress for this message"));
        }

        let now = Utc::now();
        let timeout = self.config.timeout();
        let info = SessionInfo {
            id: id.clone(),
            instance: request.instance,
            chat_id: request.chat_id,
            message_id: request.message_id,
            process_type: request.process_type,
            started_at: now,
            timeout_at: now + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero()),
            current_indicator_index: 0,
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let task = SessionTask {
            info: info.clone(),
            generation,
            config: Arc::clone(&self.config),
            sender: Arc::clone(&self.sender),
            sessions: Arc::clone(&self.sessions),
            counters: Arc::clone(&self.counters),
            cancel: cancel.clone(),
            deadline: started + timeout,
            started,
        };
        let handle = tokio::spawn(task.run());

        sessions.insert(
            id.clone(),
            SessionEntry {
                info,
                generation,
                cancel,
                handle,
                started,
            },
        );
        drop(sessions);

        self.counters.lock().started += 1;
        info!(session_id = %id, "Feedback session started");
        Ok(id)
    }

    /// Close a session with the indicator for `request.status`
    pub async fn finish(&self, request: FinishRequest) -> Result<()> {
        request.validate()?;
        let id = request.session_id();

        let entry = self.sessions.lock().remove(&id);
        let Some(entry) = entry else {
            debug!(session_id = %id, "Finish for unknown feedback session");
            return Err(RelayError::not_found("Processing session not found"));
        };

        entry.cancel.cancel();
        if let Err(e) = entry.handle.await {
            warn!(session_id = %id, error = %e, "Feedback session task ended abnormally");
        }

        let indicator = match request.status {
            FinishStatus::Success => &self.config.success_indicator,
            FinishStatus::Error => &self.config.error_indicator,
            FinishStatus::Aborted => &self.config.aborted_indicator,
        };
        post_reaction(self.sender.as_ref(), &entry.info, indicator).await;

        if let Some(text) = request.text.as_deref().filter(|t| !t.is_empty()) {
            if let Err(e) = self.sender.send_text(&entry.info.instance, &entry.info.chat_id, text).await {
                warn!(session_id = %id, error = %e, "Failed to send feedback text");
            }
        }

        {
            let mut counters = self.counters.lock();
            counters.finished += 1;
            counters.record_end(entry.started);
        }

        match &request.error_message {
            Some(message) => info!(session_id = %id, status = ?request.status, error = %message, "Feedback session finished"),
            None => info!(session_id = %id, status = ?request.status, "Feedback session finished"),
        }
        Ok(())
    }

    /// Drop a session without posting a terminal indicator
    pub async fn force_cleanup(&self, session_id: &str) -> bool {
        let entry = self.sessions.lock().remove(session_id);
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                let _ = entry.handle.await;
                self.counters.lock().record_end(entry.started);
                info!(session_id, "Feedback session force-cleaned");
                true
            }
            None => false,
        }
    }

    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.lock().values().map(|entry| entry.info.clone()).collect();
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    pub fn stats(&self) -> FeedbackStats {
        let active = self.sessions.lock().len();
        let counters = self.counters.lock();
        FeedbackStats {
            active,
            started: counters.started,
            finished: counters.finished,
            timed_out: counters.timed_out,
            average_duration_ms: if counters.ended == 0 {
                0.0
            } else {
                counters.total_duration_ms / counters.ended as f64
            },
        }
    }

    /// Cancel every session without posting terminal indicators
    pub async fn shutdown(&self) {
        let entries: Vec<(String, SessionEntry)> = self.sessions.lock().drain().collect();
        if entries.is_empty() {
            return;
        }

        let count = entries.len();
        for (_, entry) in &entries {
            entry.cancel.cancel();
        }
        for (_, entry) in entries {
            let _ = entry.handle.await;
        }
        info!(sessions = count, "Feedback sessions cancelled");
    }
}

async fn post_reaction(sender: &dyn FeedbackSender, info: &SessionInfo, indicator: &str) {
    if indicator.is_empty() {
        return;
    }
    if let Err(e) = sender.send_reaction(&info.instance, &info.message_key(), indicator).await {
        warn!(session_id = %info.id, indicator, error = %e, "Failed to post feedback indicator");
    }
}

struct SessionTask {
    info: SessionInfo,
    generation: u64,
    config: Arc<FeedbackConfig>,
    sender: Arc<dyn FeedbackSender>,
    sessions: Sessions,
    counters: Arc<Mutex<Counters>>,
    cancel: CancellationToken,
    deadline: Instant,
    started: Instant,
}

impl SessionTask {
    async fn run(self) {
        let indicators = &self.config.progress_indicators;
        let mut index = 0;
        if let Some(first) = indicators.first() {
            post_reaction(self.sender.as_ref(), &self.info, first).await;
        }

        let period = self.config.loop_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(self.deadline) => {
                    self.expire().await;
                    return;
                }
                _ = ticker.tick() => {
                    if indicators.is_empty() {
                        continue;
                    }
                    index = (index + 1) % indicators.len();
                    if let Some(entry) = self.sessions.lock().get_mut(&self.info.id) {
                        entry.info.current_indicator_index = index;
                    }
                    post_reaction(self.sender.as_ref(), &self.info, &indicators[index]).await;
                }
            }
        }
    }

    async fn expire(&self) {
        let removed = {
            let mut sessions = self.sessions.lock();
            let current = sessions
                .get(&self.info.id)
                .is_some_and(|entry| entry.generation == self.generation);
            if current { sessions.remove(&self.info.id) } else { None }
        };
        if removed.is_none() {
            return;
        }

        warn!(session_id = %self.info.id, timeout_secs = self.config.timeout_secs, "Feedback session timed out");
        post_reaction(self.sender.as_ref(), &self.info, &self.config.timeout_indicator).await;

        let mut counters = self.counters.lock();
        counters.timed_out += 1;
        counters.record_end(self.started);
    }
}
