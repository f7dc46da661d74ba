//! The public façade: aggregates partitions and exposes `get`/`put`/`read`/
//! `dirty_read`/`stats`/`stop`.

use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{instrument, warn};

use crate::config::{CacheConfig, Expiration};
use crate::error::{CacheError, Error, Result};
use crate::keylock::{Acquisition, WaitOutcome};
use crate::partition::{partition_of, Partition};
use crate::stats::CacheStatsSnapshot;
use crate::COORDINATION_TIMEOUT;

/// An in-process, in-memory key/value cache with single-flight stampede
/// protection.
///
/// `K` is the key type, `V` the value type, `E` the producer's error type.
/// Cheap to clone — internally it is just `Arc`-backed partitions plus a
/// shutdown signal — so it can be shared across tasks the way a connection
/// pool handle would be.
pub struct Cache<K, V, E>
where
    K: Eq + Hash + Clone,
{
    partitions: Vec<Partition<K, V, E>>,
    seed: RandomState,
    shutdown_tx: broadcast::Sender<()>,
}

impl<K, V, E> Cache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: std::error::Error + Clone + Send + Sync + 'static,
{
    /// Starts a cache instance: allocates `config.partitions` independent
    /// partitions, each with its own Replier and (unless `purge_interval`
    /// is `None`) Purger task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config.partitions` is zero.
    pub async fn start(config: CacheConfig) -> Result<Self> {
        if config.partitions == 0 {
            return Err(Error::Config("partitions must be at least 1".to_string()));
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        let partitions = (0..config.partitions)
            .map(|_| Partition::new(config.purge_interval, shutdown_tx.subscribe()))
            .collect();

        Ok(Self {
            partitions,
            seed: RandomState::new(),
            shutdown_tx,
        })
    }

    /// Signals every partition's Purger and Replier tasks to stop, then
    /// awaits their completion.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        for partition in self.partitions {
            partition.join().await;
        }
    }

    /// Aggregated hit/miss/purge counters across all partitions.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.partitions
            .iter()
            .map(|p| p.stats.snapshot())
            .fold(CacheStatsSnapshot::default(), CacheStatsSnapshot::merge)
    }

    fn partition_for(&self, key: &K) -> &Partition<K, V, E> {
        let index = partition_of(key, &self.seed, self.partitions.len());
        &self.partitions[index]
    }

    /// Partition-routed lookup. Never returns an entry whose deadline has
    /// passed, regardless of purge scheduling.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let partition = self.partition_for(key);
        match partition.store.lookup(key) {
            Some(value) => {
                partition.stats.record_hit();
                Some(value)
            }
            None => {
                partition.stats.record_miss();
                None
            }
        }
    }

    /// Best-effort installation: loses a race to any concurrent single-flight
    /// producer or to another concurrent `put`. Always reports success to
    /// the caller — the "already present" outcome only matters internally,
    /// where overwriting it would break the single-flight contract.
    pub fn put(&self, key: K, value: V, expiration: Expiration) {
        let partition = self.partition_for(&key);
        partition.store.insert_if_absent(key, value, expiration);
    }

    /// The stampede-safe read: on a miss, exactly one concurrent caller per
    /// key runs `producer`; every other concurrent caller for that key
    /// receives the same terminal outcome without invoking it themselves.
    ///
    /// # Errors
    ///
    /// See [`CacheError`] for the taxonomy of non-panic failure modes. If
    /// `producer` panics, this function does not return at all — it resumes
    /// the original panic in the owner's caller (every other concurrent
    /// caller instead receives `CacheError::CallbackFailure`).
    #[instrument(skip(self, producer))]
    pub async fn read<F, Fut>(&self, key: K, expiration: Expiration, producer: F) -> std::result::Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let partition = self.partition_for(&key);
        match Arc::clone(&partition.key_lock).acquire(key.clone()) {
            Acquisition::Waiter(rx) => match tokio::time::timeout(COORDINATION_TIMEOUT, rx).await {
                Ok(Ok(WaitOutcome::Retry)) => self.retry_after_fill(&key),
                Ok(Ok(WaitOutcome::Err(err))) => Err(err),
                Ok(Err(_sender_dropped)) => {
                    warn!("single-flight waiter's sender was dropped without delivering a result");
                    Err(CacheError::CoordinatorTimeout)
                }
                Err(_elapsed) => Err(CacheError::CoordinatorTimeout),
            },
            Acquisition::Owner(mut guard) => {
                let handle = tokio::spawn(producer());
                guard.track(handle.abort_handle());

                match handle.await {
                    Ok(Ok(value)) => {
                        partition.store.insert_if_absent(key, value.clone(), expiration);
                        guard.release(WaitOutcome::Retry);
                        partition.stats.record_hit();
                        Ok(value)
                    }
                    Ok(Err(producer_err)) => {
                        guard.release(WaitOutcome::Err(CacheError::Producer(producer_err.clone())));
                        Err(CacheError::Producer(producer_err))
                    }
                    Err(join_err) => {
                        guard.release(WaitOutcome::Err(CacheError::CallbackFailure));
                        if join_err.is_panic() {
                            std::panic::resume_unwind(join_err.into_panic());
                        }
                        // The producer task was cancelled without us having
                        // aborted it ourselves — only possible during
                        // runtime shutdown. Report it the same way a crash
                        // would be reported to this caller.
                        Err(CacheError::CallbackFailure)
                    }
                }
            }
        }
    }

    /// Re-checks the Store after a `Retry` outcome. Returns
    /// `CacheError::RetryFailure` if the value is gone by the time this
    /// caller re-reads it (e.g. purged in the interim).
    fn retry_after_fill(&self, key: &K) -> std::result::Result<V, CacheError<E>> {
        self.get(key).ok_or(CacheError::RetryFailure)
    }

    /// The explicit, stampede-*unsafe* fast path: on a miss, this caller
    /// always runs `producer` itself, with no coordination against other
    /// concurrent misses for the same key. A panic in `producer` propagates
    /// to this caller exactly as ordinary synchronous Rust code would, since
    /// there are no waiters to notify first.
    ///
    /// # Errors
    ///
    /// Returns whatever error `producer` returns, unmodified.
    pub async fn dirty_read<F, Fut>(&self, key: K, expiration: Expiration, producer: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let value = producer().await?;
        let partition = self.partition_for(&key);
        partition.store.insert_if_absent(key, value.clone(), expiration);
        Ok(value)
    }
}
