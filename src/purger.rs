//! The periodic background sweep that reclaims expired entries.
//!
//! Purging is pure memory hygiene: `Store::lookup` already refuses to
//! return an expired entry on its own (see `store.rs`), so a delayed or
//! skipped purge tick never causes a stale value to leak out — it only
//! delays when the entry's memory is reclaimed.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::debug;

use crate::stats::PartitionStats;
use crate::store::Store;

/// Spawns the purger task for one partition. Returns `None` without
/// spawning anything if `purge_interval` is `None` ("never") — deadlines are
/// still honored observationally by `Store::lookup`.
pub(crate) fn spawn<K, V>(
    store: Arc<Store<K, V>>,
    stats: Arc<PartitionStats>,
    purge_interval: Option<Duration>,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<tokio::task::JoinHandle<()>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let interval = purge_interval?;
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so we don't purge a
        // key the instant it's created.
        ticker.tick().await;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let removed = store.purge_expired(Instant::now());
                    if removed > 0 {
                        stats.record_purged(removed as u64);
                        debug!(removed, "purged expired entries");
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Expiration;

    #[tokio::test]
    async fn disabled_purger_spawns_nothing() {
        let store = Arc::new(Store::<&str, i32>::new());
        let stats = Arc::new(PartitionStats::default());
        let (_tx, rx) = broadcast::channel(1);
        assert!(spawn(store, stats, None, rx).is_none());
    }

    #[tokio::test]
    async fn periodic_purge_removes_expired_entries() {
        let store = Arc::new(Store::<&str, i32>::new());
        store.insert_if_absent("k", 1, Expiration::After(Duration::from_millis(5)));
        let stats = Arc::new(PartitionStats::default());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn(Arc::clone(&store), Arc::clone(&stats), Some(Duration::from_millis(20)), shutdown_rx).unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        // Deadline has passed; lookup already hides it regardless of the
        // purger, but confirm the purge actually ran by checking len() which
        // reflects physical removal.
        assert_eq!(store.lookup(&"k"), None);
        assert_eq!(stats.snapshot().purged, 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn purge_never_removes_a_non_expiring_entry() {
        let store = Arc::new(Store::<&str, i32>::new());
        store.insert_if_absent("forever", 1, Expiration::Never);
        let stats = Arc::new(PartitionStats::default());

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = spawn(Arc::clone(&store), Arc::clone(&stats), Some(Duration::from_millis(10)), shutdown_rx).unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.lookup(&"forever"), Some(1));
        assert_eq!(stats.snapshot().purged, 0);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
