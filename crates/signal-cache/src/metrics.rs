//! Cache metrics counters — ambient diagnostics, `spec.md` §6 mentions
//! `cache_name_prefix` is "used only for metrics/diagnostics", so this
//! module is the diagnostics the prefix labels.
//!
//! Plain atomics, the way `toka_kernel`'s own internal counters are kept:
//! cheap to update from any call site, cheap to snapshot for a
//! `tracing` event or an external exporter.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one cache instance.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    loader_invocations: AtomicU64,
    loader_failures: AtomicU64,
    invalidations: AtomicU64,
    folds: AtomicU64,
    evictions: AtomicU64,
}

impl CacheMetrics {
    /// A fresh, zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `READY` hit.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an absent-or-`IN_FLIGHT`-join lookup.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that this call became the one loader invocation for a key.
    pub fn record_loader_invocation(&self) {
        self.loader_invocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a loader failure.
    pub fn record_loader_failure(&self) {
        self.loader_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an explicit or decision-engine-triggered invalidation.
    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed local fold.
    pub fn record_fold(&self) {
        self.folds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an eviction sweep removing an entry.
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loader_invocations: self.loader_invocations.load(Ordering::Relaxed),
            loader_failures: self.loader_failures.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            folds: self.folds.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// An immutable point-in-time read of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetricsSnapshot {
    /// `READY` hits.
    pub hits: u64,
    /// Absent-or-join lookups.
    pub misses: u64,
    /// Loader calls actually made.
    pub loader_invocations: u64,
    /// Loader calls that failed.
    pub loader_failures: u64,
    /// Invalidations performed.
    pub invalidations: u64,
    /// Local folds performed.
    pub folds: u64,
    /// Entries removed by the eviction sweep.
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.snapshot(), CacheMetricsSnapshot::default());

        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_fold();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.folds, 1);
    }
}
