use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Deserialize;

/// Time source for entry expiry. Tests substitute a manual clock.
pub type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

const DEFAULT_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Maximum number of remembered paths; least recently accepted go first.
    pub capacity: usize,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Bounded memory of recently accepted paths.
///
/// The cache is advisory: an entry may vanish early through eviction, but a
/// path is never reported as seen unless it was accepted and its entry is
/// still live. A lock that cannot be taken reads as "not seen".
pub struct DedupCache {
    entries: Mutex<LruCache<String, Option<Instant>>>,
    clock: Clock,
}

impl DedupCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_clock(capacity, Arc::new(Instant::now))
    }

    pub fn with_clock(capacity: NonZeroUsize, clock: Clock) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            clock,
        }
    }

    pub fn seen(&self, path: &str) -> bool {
        let now = (self.clock)();
        let Ok(entries) = self.entries.lock() else {
            return false;
        };
        entries
            .peek(path)
            .is_some_and(|expires_at| is_live(*expires_at, now))
    }

    /// Records `path` as accepted for `ttl`, truncated to whole seconds. A ttl
    /// under one second never expires.
    pub fn mark_seen(&self, path: &str, ttl: Duration) {
        let now = (self.clock)();
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(path.to_string(), expiry(now, ttl));
        }
    }

    /// Check-and-mark in one critical section. Returns true when the caller
    /// won the path for this expiry window.
    pub fn accept(&self, path: &str, ttl: Duration) -> bool {
        let now = (self.clock)();
        let Ok(mut entries) = self.entries.lock() else {
            return true;
        };
        if entries
            .peek(path)
            .is_some_and(|expires_at| is_live(*expires_at, now))
        {
            return false;
        }
        entries.put(path.to_string(), expiry(now, ttl));
        true
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn expiry(now: Instant, ttl: Duration) -> Option<Instant> {
    match ttl.as_secs() {
        0 => None,
        secs => now.checked_add(Duration::from_secs(secs)),
    }
}

fn is_live(expires_at: Option<Instant>, now: Instant) -> bool {
    expires_at.map_or(true, |at| now < at)
}
