//! Common test utilities for event-relay
//!
//! - Relay configurations pointed at a mock webhook server
//! - Messaging event factories
//! - Mock webhook helpers and polling assertions

pub mod assertions;
pub mod fixtures;

pub use assertions::eventually;
pub use fixtures::{EventFactory, direct_config, queued_config};
