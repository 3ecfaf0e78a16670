//! Token bucket admission control
//!
//! A single bucket is shared by every consumer of the queue; callers decide what a
//! rejected `consume` means for them.

mod bucket;
mod types;


pub use bucket::TokenBucket;
pub use types::TokenBucketStatus;
