//! Error handling for the relay
//!
//! This module defines the error type shared by every component of the pipeline.

mod helpers;
mod types;

pub use types::{RelayError, Result};
