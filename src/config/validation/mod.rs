//! Configuration validation
//!
//! - `endpoint`: scheme and host checks for outbound endpoints
//! - `trait_def`: the `Validate` trait
//! - `relay_validators`: validators for every relay section

mod endpoint;
mod relay_validators;
mod trait_def;

pub use endpoint::validate_http_url;
pub use trait_def::Validate;
