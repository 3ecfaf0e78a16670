//! Core pipeline components
//!
//! Filtering, admission control, queueing, delivery and feedback sessions. The
//! [`Relay`](crate::Relay) facade wires them together.

pub mod feedback;
pub mod filter;
pub mod processor;
pub mod queue;
pub mod rate_limiter;
pub mod webhooks;
