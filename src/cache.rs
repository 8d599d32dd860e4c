use lru::LruCache;
use std::num::NonZeroUsize;

use crate::triage::BucketId;

/// Default number of short signatures remembered.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Remembers which buckets recently matched reports with a given short
/// signature. Only a hint: triage falls back to a full scan when the hinted
/// buckets do not match.
pub struct TriageCache {
    entries: LruCache<String, Vec<BucketId>>,
}

impl TriageCache {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { entries: LruCache::new(cap) }
    }

    /// Candidate buckets for `key`, oldest first. Does not touch recency.
    pub fn hint(&self, key: &str) -> Vec<BucketId> {
        self.entries.peek(key).cloned().unwrap_or_default()
    }

    /// Record a successful match. The key becomes most recently used and
    /// `bucket` is appended to its candidates, even if already present.
    /// Returns the key evicted to make room, if any.
    pub fn record_match(&mut self, key: &str, bucket: BucketId) -> Option<String> {
        let mut ids = self.entries.pop(key).unwrap_or_default();
        ids.push(bucket);
        match self.entries.push(key.to_string(), ids) {
            Some((evicted, _)) if evicted != key => {
                tracing::debug!(key = %evicted, "triage cache evicted");
                Some(evicted)
            }
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for TriageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
