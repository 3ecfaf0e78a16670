//! Message admissibility filter
//!
//! `FilterEngine::decide` is the single entry point: it checks the message kind, the
//! global audio size ceiling, the audio duration bounds and finally the text lists,
//! stopping at the first check that blocks. Audio duration outcomes are counted per
//! subject in the [`FilterStatsTracker`].

mod engine;
mod extract;
mod stats;
mod types;


pub use crate::config::models::filter::{AudioDurationFilter, MessageFilter, TextFilters};
pub use engine::FilterEngine;
pub use stats::FilterStatsTracker;
pub use types::{
    FilterDecision, FilterStats, FilterStatsReport, GLOBAL_MAX_AUDIO_BYTES, OVERSIZE_AUDIO_MARKER,
};
