use chrono::{DateTime, TimeDelta, Utc};
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// A stored value together with its lifetime.
///
/// This is also the on-disk and on-the-wire envelope used by the storage backends.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry that lives for `ttl` starting at `now`.
    ///
    /// A zero `ttl` produces an entry that is already expired.
    #[must_use]
    pub fn new(key: impl Into<String>, value: serde_json::Value, ttl: Duration, now: DateTime<Utc>) -> Self {
        let lifetime = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        Self {
            key: key.into(),
            value,
            created_at: now,
            expires_at: now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether the entry may still be served at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Time left before expiry, or zero if already expired.
    #[must_use]
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO)
    }

    /// Age of the entry at `now`. Entries from the future (clock skew) have age zero.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}
