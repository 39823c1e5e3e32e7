//! Per-client admission control.

mod bucket;
mod registry;

pub use bucket::RateLimiter;
pub use registry::{ClientLimiterRegistry, spawn_sweeper};
