//! Lightweight atomic cache statistics.
//!
//! Mirrors the hit/miss/eviction counters `mcp-gateway` keeps for its own
//! response cache (`cache.rs::CacheStats`): plain atomics, read with
//! `Ordering::Relaxed`, aggregated on demand rather than pushed anywhere.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-partition counters, owned by [`crate::partition::Partition`].
#[derive(Debug, Default)]
pub(crate) struct PartitionStats {
    hits: AtomicU64,
    misses: AtomicU64,
    purged: AtomicU64,
}

impl PartitionStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_purged(&self, count: u64) {
        if count > 0 {
            self.purged.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time, cheap-to-clone view of a cache's aggregated statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsSnapshot {
    /// Total `get`/`read` lookups that found a live entry.
    pub hits: u64,
    /// Total `get`/`read` lookups that found no live entry.
    pub misses: u64,
    /// Total entries removed by background purgers.
    pub purged: u64,
}

impl CacheStatsSnapshot {
    /// Combines two snapshots, e.g. when aggregating across partitions.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            purged: self.purged + other.purged,
        }
    }

    /// Hit rate as a fraction in `[0.0, 1.0]`. `0.0` when there have been no
    /// lookups at all.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_starts_at_zero_with_zero_hit_rate() {
        let stats = PartitionStats::default();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot, CacheStatsSnapshot::default());
        assert_eq!(snapshot.hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_reflects_recorded_hits_and_misses() {
        let stats = PartitionStats::default();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert_eq!(stats.snapshot().hit_rate(), 0.75);
    }

    #[test]
    fn merge_sums_both_snapshots_fieldwise() {
        let a = CacheStatsSnapshot { hits: 2, misses: 1, purged: 0 };
        let b = CacheStatsSnapshot { hits: 3, misses: 0, purged: 5 };
        let merged = a.merge(b);
        assert_eq!(merged, CacheStatsSnapshot { hits: 5, misses: 1, purged: 5 });
    }
}
