//! Engagement Module
//!
//! Race-safe like and download counters with cache coherence repair.

mod engine;
mod identity;
mod rate_limit;

pub use engine::EngagementEngine;
pub use identity::{ClientIdentity, FALLBACK_IDENTITY, MAX_IDENTITY_LENGTH};
pub use rate_limit::LikeRateLimiter;
