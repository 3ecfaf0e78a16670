//! Integration tests for event-relay
//!
//! Each test drives a full [`Relay`](event_relay::Relay) against mock webhooks.

pub mod admin_tests;
pub mod admission_tests;
pub mod config_validation_tests;
pub mod delivery_tests;
pub mod pipeline_tests;
