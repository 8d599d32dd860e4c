//! Assigning reports to buckets.
//!
//! A triage call tests the buckets the cache remembers for the report's
//! short signature first, then every other bucket, newest id first. The
//! first matching signature wins.

use crate::cache::TriageCache;
use crate::config::TriageConfig;
use crate::report::Report;
use crate::signature::Signature;
use ahash::AHashSet;
use std::cmp::Reverse;
use std::sync::{Mutex, PoisonError};

pub type BucketId = u64;

#[derive(Debug, Clone)]
pub struct Bucket {
    pub id: BucketId,
    pub signature: Signature,
}

/// A stored report together with its triage state.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub id: u64,
    pub report: Report,
    pub bucket: Option<BucketId>,
    /// Set after the first automatic triage, matched or not.
    pub triaged_once: bool,
}

impl ReportEntry {
    pub fn new(id: u64, report: Report) -> Self {
        Self { id, report, bucket: None, triaged_once: false }
    }

    /// Waiting for its first automatic triage.
    pub fn is_pending(&self) -> bool {
        !self.triaged_once && self.bucket.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriageOutcome {
    pub bucket: Option<BucketId>,
    /// The match came from a bucket the cache suggested.
    pub cache_hit: bool,
    /// Signatures evaluated, across both phases.
    pub buckets_tested: usize,
}

pub struct TriageEngine {
    cache: TriageCache,
    config: TriageConfig,
}

impl TriageEngine {
    pub fn new(config: TriageConfig) -> Self {
        Self { cache: TriageCache::new(config.cache_capacity), config }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn cache(&self) -> &TriageCache {
        &self.cache
    }

    /// Find the bucket for `report`. Cache state only changes on a match.
    pub fn triage(&mut self, report: &Report, buckets: &[Bucket]) -> TriageOutcome {
        let key = report.short_signature.as_str();
        let hint: AHashSet<BucketId> = self.cache.hint(key).into_iter().collect();
        let mut tested = 0;

        if !hint.is_empty() {
            let mut hinted: Vec<&Bucket> = buckets.iter().filter(|b| hint.contains(&b.id)).collect();
            hinted.sort_by_key(|b| Reverse(b.id));
            for bucket in hinted {
                tested += 1;
                if bucket.signature.matches(report) {
                    tracing::debug!(key, bucket = bucket.id, "triage cache hit");
                    return self.assign(key, bucket.id, true, tested);
                }
            }
            tracing::debug!(key, candidates = hint.len(), "cached buckets no longer match");
        } else {
            tracing::debug!(key, "triage cache miss");
        }

        let mut rest: Vec<&Bucket> = buckets.iter().filter(|b| !hint.contains(&b.id)).collect();
        rest.sort_by_key(|b| Reverse(b.id));
        let limit = self.config.max_buckets_scanned.unwrap_or(usize::MAX);
        for bucket in rest.into_iter().take(limit) {
            tested += 1;
            if bucket.signature.matches(report) {
                return self.assign(key, bucket.id, false, tested);
            }
        }

        tracing::info!(key, tested, "no matching bucket");
        TriageOutcome { bucket: None, cache_hit: false, buckets_tested: tested }
    }

    fn assign(&mut self, key: &str, bucket: BucketId, cache_hit: bool, tested: usize) -> TriageOutcome {
        self.cache.record_match(key, bucket);
        tracing::info!(key, bucket, cache_hit, tested, "report bucketed");
        TriageOutcome { bucket: Some(bucket), cache_hit, buckets_tested: tested }
    }

    /// Triage one stored entry and record the result on it.
    pub fn triage_entry(&mut self, entry: &mut ReportEntry, buckets: &[Bucket]) -> TriageOutcome {
        let outcome = self.triage(&entry.report, buckets);
        if outcome.bucket.is_some() {
            entry.bucket = outcome.bucket;
        }
        entry.triaged_once = true;
        outcome
    }

    /// Triage every pending entry, then flag entries that were bucketed by
    /// hand as triaged. `keep_going` is polled between reports; returning
    /// false stops the pass early. Returns how many entries were triaged.
    pub fn triage_pending<F>(&mut self, entries: &mut [ReportEntry], buckets: &[Bucket], mut keep_going: F) -> usize
    where
        F: FnMut() -> bool,
    {
        let mut done = 0;
        for entry in entries.iter_mut().filter(|e| e.is_pending()) {
            if !keep_going() {
                tracing::warn!(done, "triage pass interrupted");
                break;
            }
            self.triage_entry(entry, buckets);
            done += 1;
        }
        for entry in entries.iter_mut().filter(|e| e.bucket.is_some()) {
            entry.triaged_once = true;
        }
        done
    }
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::new(TriageConfig::default())
    }
}

/// A triage engine shared between threads. Each call holds the lock from
/// the cache lookup through the cache update.
pub struct SharedTriageEngine {
    inner: Mutex<TriageEngine>,
}

impl SharedTriageEngine {
    pub fn new(engine: TriageEngine) -> Self {
        Self { inner: Mutex::new(engine) }
    }

    pub fn triage(&self, report: &Report, buckets: &[Bucket]) -> TriageOutcome {
        // a poisoned cache still holds valid hints
        let mut engine = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        engine.triage(report, buckets)
    }

    pub fn triage_entry(&self, entry: &mut ReportEntry, buckets: &[Bucket]) -> TriageOutcome {
        let mut engine = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        engine.triage_entry(entry, buckets)
    }

    pub fn into_inner(self) -> TriageEngine {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
