//! Health verdict for the relay pipeline

mod checker;
mod types;


pub use checker::assess;
pub use types::{HealthInputs, HealthReport, HealthStatus};
