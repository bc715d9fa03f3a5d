// Cached entry model.
// Pairs cached content with its store time and handles the timestamp encoding.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Default freshness window: 60 seconds.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60);

/// Cached content with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// The raw fetched payload.
    pub content: String,
    /// When the content was stored.
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(content: impl Into<String>) -> Self {
        Self::stored_at(content, Utc::now())
    }

    pub fn stored_at(content: impl Into<String>, stored_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            stored_at,
        }
    }

    /// Rebuild an entry from the two independently read store values.
    ///
    /// Content without a timestamp, a timestamp without content, or an
    /// unparsable timestamp all count as no entry.
    pub fn from_parts(content: Option<String>, timestamp: Option<String>) -> Option<Self> {
        let stored_at = decode_timestamp(&timestamp?)?;
        Some(Self::stored_at(content?, stored_at))
    }

    /// Age of the entry at `now`. Entries stamped in the future have zero age.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is strictly younger than `window` at `now`.
    pub fn is_fresh_at(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) < window
    }

    pub fn is_fresh(&self, window: Duration) -> bool {
        self.is_fresh_at(window, Utc::now())
    }
}

/// Encode a time as epoch milliseconds, the persisted timestamp format.
pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

/// Parse an epoch-millisecond string back into a time.
pub fn decode_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let millis: i64 = value.trim().parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

/// Whether at least `interval` has passed between `since` and `now`.
pub fn has_elapsed(since: DateTime<Utc>, interval: Duration, now: DateTime<Utc>) -> bool {
    let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(since) >= interval
}
