use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::CacheBackend;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process TTL store. Entries expire relative to their own insertion and
/// are dropped lazily on read or by [`CacheBackend::remove_expired`].
#[derive(Default)]
pub struct MemoryBackend {
    data: DashMap<String, CacheEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        let now = Instant::now();

        let expired = match self.data.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.data.remove_if(key, |_, entry| entry.is_expired(now));
        }

        None
    }

    fn write(&self, key: String, value: String, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        let _ = self.data.insert(key, entry);
    }

    fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.data.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
