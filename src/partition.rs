//! One independent shard of the cache: its own Store, KeyLock, Replier task,
//! and Purger task. Partitions never synchronize with one another.

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::keylock::KeyLock;
use crate::stats::PartitionStats;
use crate::store::Store;

pub(crate) struct Partition<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub(crate) store: Arc<Store<K, V>>,
    pub(crate) key_lock: Arc<KeyLock<K, V, E>>,
    pub(crate) stats: Arc<PartitionStats>,
    replier_handle: tokio::task::JoinHandle<()>,
    purger_handle: Option<tokio::task::JoinHandle<()>>,
}

impl<K, V, E> Partition<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(purge_interval: Option<std::time::Duration>, shutdown: broadcast::Receiver<()>) -> Self {
        let store = Arc::new(Store::new());
        let stats = Arc::new(PartitionStats::default());
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let key_lock = Arc::new(KeyLock::new(reply_tx));
        let replier_handle = crate::replier::spawn(reply_rx, shutdown.resubscribe());
        let purger_handle = crate::purger::spawn(Arc::clone(&store), Arc::clone(&stats), purge_interval, shutdown);

        Self {
            store,
            key_lock,
            stats,
            replier_handle,
            purger_handle,
        }
    }

    /// Awaits the Replier and Purger tasks after a shutdown signal has
    /// already been broadcast to them.
    pub(crate) async fn join(self) {
        let _ = self.replier_handle.await;
        if let Some(handle) = self.purger_handle {
            let _ = handle.await;
        }
    }
}

/// Routes `key` to a partition index in `[0, partition_count)`.
///
/// `seed` is a per-cache-instance random state, so routing is deterministic
/// for the lifetime of one `Cache` but not predictable or stable across
/// separate instances — the spec only requires the former.
pub(crate) fn partition_of<K: Hash>(key: &K, seed: &std::collections::hash_map::RandomState, partition_count: usize) -> usize {
    let hash = seed.hash_one(key);
    (hash as usize) % partition_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_of_is_stable_for_a_given_seed() {
        let seed = std::collections::hash_map::RandomState::new();
        let first = partition_of(&"some-key", &seed, 8);
        let second = partition_of(&"some-key", &seed, 8);
        assert_eq!(first, second);
    }

    #[test]
    fn partition_of_always_returns_an_in_range_index() {
        let seed = std::collections::hash_map::RandomState::new();
        for i in 0..1000 {
            let idx = partition_of(&i, &seed, 4);
            assert!(idx < 4);
        }
    }
}
