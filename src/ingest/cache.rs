//! # Snapshot Cache
//! Single-slot, time-windowed cache for the most recent raw feed (default 1h).
//!
//! Expiry is lazy: a stale entry is dropped by the first read that notices it.
//! There is no background eviction.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::ingest::types::RawSnapshot;

/// The one cached snapshot plus the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: RawSnapshot,
    pub expires_at: DateTime<Utc>,
}

/// Thread-safe single-slot cache. Readers see a whole entry or nothing.
#[derive(Debug)]
pub struct SnapshotCache {
    slot: Mutex<Option<CacheEntry>>,
    window: Duration,
}

impl SnapshotCache {
    pub fn with_window(window: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            window,
        }
    }

    /// Convenience constructor for the 1h window.
    pub fn new_1h() -> Self {
        Self::with_window(Duration::from_secs(3600))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Current snapshot if it was fetched less than `window` ago.
    pub fn get(&self) -> Option<RawSnapshot> {
        self.get_at(Utc::now())
    }

    /// Same as [`get`](Self::get) with an explicit clock reading.
    pub fn get_at(&self, now: DateTime<Utc>) -> Option<RawSnapshot> {
        let mut slot = self.lock();
        match slot.as_ref() {
            Some(entry) if now < entry.expires_at => Some(entry.snapshot.clone()),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    /// Replace the slot wholesale.
    pub fn put(&self, snapshot: RawSnapshot) {
        let expires_at = expiry_for(snapshot.fetched_at, self.window);
        *self.lock() = Some(CacheEntry {
            snapshot,
            expires_at,
        });
    }

    /// Expiry of the current entry, if any (stale or not).
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock().as_ref().map(|e| e.expires_at)
    }

    fn lock(&self) -> MutexGuard<'_, Option<CacheEntry>> {
        match self.slot.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

fn expiry_for(fetched_at: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|w| fetched_at.checked_add_signed(w))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot_at(secs: i64) -> RawSnapshot {
        RawSnapshot::new(Vec::new(), Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn empty_cache_misses() {
        let cache = SnapshotCache::new_1h();
        assert!(cache.get().is_none());
        assert!(cache.expires_at().is_none());
    }

    #[test]
    fn stale_entry_is_dropped_on_read() {
        let cache = SnapshotCache::with_window(Duration::from_secs(10));
        cache.put(snapshot_at(1_000));
        assert!(cache.get_at(Utc.timestamp_opt(1_010, 0).unwrap()).is_none());
        // lazily cleared, so even an earlier clock reading misses now
        assert!(cache.get_at(Utc.timestamp_opt(1_001, 0).unwrap()).is_none());
        assert!(cache.expires_at().is_none());
    }

    #[test]
    fn put_replaces_previous_entry() {
        let cache = SnapshotCache::with_window(Duration::from_secs(10));
        cache.put(snapshot_at(1_000));
        cache.put(snapshot_at(2_000));
        let got = cache.get_at(Utc.timestamp_opt(2_005, 0).unwrap()).unwrap();
        assert_eq!(got.fetched_at.timestamp(), 2_000);
        assert_eq!(cache.expires_at().unwrap().timestamp(), 2_010);
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let cache = SnapshotCache::with_window(Duration::from_secs(u64::MAX));
        cache.put(snapshot_at(1_000));
        assert!(cache.get().is_some());
    }
}
