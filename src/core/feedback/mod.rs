//! Processing feedback
//!
//! Sessions keyed by `instance:chat:message` that keep a progress indicator on a message
//! while an external operation runs, then replace it with a terminal one.

mod manager;
mod sender;
mod types;

pub use manager::FeedbackManager;
pub use sender::{FeedbackSender, HttpFeedbackSender, NoopFeedbackSender};
pub use types::{
    FeedbackStats, FinishRequest, FinishStatus, MessageKey, SessionInfo, StartRequest, session_id,
};
