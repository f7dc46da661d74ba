//! The concurrent key/value map each partition uses for its hot read path.

use std::hash::Hash;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::Expiration;

struct Entry<V> {
    value: V,
    deadline: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }
}

/// A sharded, concurrent map from key to entry, owned by one [`crate::partition::Partition`].
///
/// Reads never serialize against each other: `dashmap::DashMap` shards its
/// internal `RwLock`s, so a lookup only ever contends with a writer touching
/// the same shard, never with another reader.
pub(crate) struct Store<K, V> {
    entries: DashMap<K, Entry<V>>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the value for `key`, unless absent or expired. An expired
    /// entry is reported as a miss but is not evicted here — that is the
    /// purger's job — so this stays wait-free against concurrent purges.
    pub(crate) fn lookup(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Installs `value` under `key` with the given `expiration`, unless a
    /// live entry already occupies that key. Returns `true` if the value was
    /// installed, `false` if a live entry was already present.
    ///
    /// Deliberately conditional: an unconditional insert here would let a
    /// stale producer's result clobber a fresher value installed by a later
    /// round (see `KeyLock`).
    pub(crate) fn insert_if_absent(&self, key: K, value: V, expiration: Expiration) -> bool {
        use dashmap::mapref::entry::Entry as MapEntry;

        let deadline = match expiration {
            Expiration::Never => None,
            Expiration::After(duration) => Some(Instant::now() + duration),
        };

        match self.entries.entry(key) {
            MapEntry::Occupied(occupied) => {
                if occupied.get().is_expired(Instant::now()) {
                    occupied.replace_entry(Entry { value, deadline });
                    true
                } else {
                    false
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry { value, deadline });
                true
            }
        }
    }

    pub(crate) fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Removes every entry whose deadline has passed. Never removes a
    /// non-expiring entry (`deadline: None`).
    pub(crate) fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_reports_miss_for_absent_key() {
        let store: Store<&str, i32> = Store::new();
        assert_eq!(store.lookup(&"k"), None);
    }

    #[test]
    fn insert_if_absent_installs_when_vacant() {
        let store = Store::new();
        assert!(store.insert_if_absent("k", 1, Expiration::Never));
        assert_eq!(store.lookup(&"k"), Some(1));
    }

    #[test]
    fn insert_if_absent_is_noop_when_live_entry_present() {
        let store = Store::new();
        assert!(store.insert_if_absent("k", 1, Expiration::Never));
        assert!(!store.insert_if_absent("k", 2, Expiration::Never));
        assert_eq!(store.lookup(&"k"), Some(1));
    }

    #[test]
    fn insert_if_absent_overwrites_an_expired_entry() {
        let store = Store::new();
        store.insert_if_absent("k", 1, Expiration::After(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(store.insert_if_absent("k", 2, Expiration::Never));
        assert_eq!(store.lookup(&"k"), Some(2));
    }

    #[test]
    fn lookup_never_returns_an_entry_past_its_deadline() {
        let store = Store::new();
        store.insert_if_absent("k", 1, Expiration::After(Duration::from_millis(5)));
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(store.lookup(&"k"), None);
    }

    #[test]
    fn purge_expired_removes_only_expired_entries() {
        let store = Store::new();
        store.insert_if_absent("live", 1, Expiration::Never);
        store.insert_if_absent("dead", 2, Expiration::After(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(20));

        let removed = store.purge_expired(Instant::now());
        assert_eq!(removed, 1);
        assert_eq!(store.lookup(&"live"), Some(1));
        assert_eq!(store.entries.len(), 1);
    }

    #[test]
    fn delete_removes_present_key_and_is_noop_for_absent_key() {
        let store = Store::new();
        store.insert_if_absent("k", 1, Expiration::Never);
        store.delete(&"k");
        assert_eq!(store.lookup(&"k"), None);
        store.delete(&"k");
    }
}
