//! Models Module
//!
//! Serializable values returned by the engagement engine and cached in
//! detail views.

mod counters;

pub use counters::{DownloadStatus, EntityCounters, LikeRecord, LikeStatus};
