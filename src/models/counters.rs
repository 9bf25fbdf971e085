//! Counter DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters persisted on a likeable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounters {
    pub entity_id: i64,
    /// Always equals the number of like records for the entity
    pub like_count: u64,
    /// Monotonically non-decreasing
    pub download_count: u64,
}

/// One identity's like of one entity. Unique on `(entity_id, identity_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRecord {
    pub entity_id: i64,
    pub identity_key: String,
    pub created_at: DateTime<Utc>,
}

/// Response of a like/unlike/toggle request.
///
/// # Fields
/// - `liked`: whether the caller's identity likes the entity after the call
/// - `like_count`: counter re-read after commit, never the pre-toggle value
/// - `changed`: false when the call was a no-op (already in the target state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeStatus {
    pub entity_id: i64,
    pub liked: bool,
    pub like_count: u64,
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub entity_id: i64,
    pub download_count: u64,
}
