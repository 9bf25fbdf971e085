//! Cache Entry Module
//!
//! A serialized value held by the in-memory backend together with its
//! expiry. Entries are copies; the relational store stays the source of truth.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Cache Entry ==
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized value
    pub value: Vec<u8>,
    pub created_at: DateTime<Utc>,
    /// Hard expiry; every entry written through the backend has one
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry expiring `ttl` from now.
    pub fn new(value: Vec<u8>, ttl: Duration) -> Self {
        let now = Utc::now();
        // Durations beyond chrono's range are clamped to "effectively never"
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    /// Expired once the current time reaches `expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_not_expired_before_ttl() {
        let entry = CacheEntry::new(b"payload".to_vec(), Duration::from_secs(60));
        assert_eq!(entry.value, b"payload");
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining() > Duration::from_secs(59));
    }

    #[test]
    fn test_entry_expires() {
        let entry = CacheEntry::new(b"payload".to_vec(), Duration::from_millis(50));
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new(Vec::new(), Duration::from_secs(10));
        assert!(entry.is_expired_at(entry.expires_at));
        assert!(!entry.is_expired_at(entry.created_at));
    }

    #[test]
    fn test_huge_ttl_does_not_overflow() {
        let entry = CacheEntry::new(Vec::new(), Duration::MAX);
        assert!(!entry.is_expired());
    }
}
