//! Single-flight election and waiter registration, per partition.
//!
//! The whole coordinator is one `parking_lot::Mutex`-guarded map. That one
//! lock is the entirety of the ordering story: because `acquire` and
//! `release` both take it for their whole critical section, the partition
//! processes every acquire/release event one at a time, in arrival order,
//! which is exactly what guarantees "at most one owner per key".

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::CacheError;

/// The one outcome every waiter (and the owner, on non-success paths)
/// eventually receives for a key.
#[derive(Debug, Clone)]
pub(crate) enum WaitOutcome<V, E> {
    /// The owner filled the key successfully. Waiters re-consult the Store
    /// rather than receiving the value directly, so that a value purged
    /// between fill and delivery surfaces as `RetryFailure` instead of
    /// silently handing out a stale copy.
    Retry,
    /// A terminal error, shared verbatim with every waiter.
    Err(CacheError<E>),
}

struct InFlightRecord<V, E> {
    waiters: Vec<oneshot::Sender<WaitOutcome<V, E>>>,
}

/// A released key's waiters and the outcome to deliver to them, handed off
/// to the [`crate::replier::Replier`] outside the `KeyLock`'s critical
/// section.
pub(crate) struct ReplyJob<V, E> {
    pub(crate) waiters: Vec<oneshot::Sender<WaitOutcome<V, E>>>,
    pub(crate) result: WaitOutcome<V, E>,
}

pub(crate) struct KeyLock<K, V, E> {
    in_flight: Mutex<HashMap<K, InFlightRecord<V, E>>>,
    reply_tx: mpsc::UnboundedSender<ReplyJob<V, E>>,
}

/// What `acquire` hands back to the caller.
pub(crate) enum Acquisition<K, V, E>
where
    K: Eq + Hash + Clone,
{
    /// The caller is now responsible for producing the value and calling
    /// `release` exactly once (directly, or implicitly via the guard's
    /// `Drop`).
    Owner(OwnerGuard<K, V, E>),
    /// Another caller already owns this key; await this receiver for the
    /// eventual outcome.
    Waiter(oneshot::Receiver<WaitOutcome<V, E>>),
}

impl<K, V, E> KeyLock<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new(reply_tx: mpsc::UnboundedSender<ReplyJob<V, E>>) -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            reply_tx,
        }
    }

    /// Elects an owner for `key`, or registers the caller as a waiter behind
    /// the existing owner. The whole decision happens under one lock
    /// acquisition, so two overlapping calls for the same key can never both
    /// become owner.
    ///
    /// Takes `self` by `Arc` (rather than `&Arc<Self>`, which is not a legal
    /// explicit receiver type on stable Rust) so the returned `OwnerGuard`
    /// can hold its own owning reference back to this lock for `release`.
    /// Call sites clone the partition's `Arc<KeyLock<_, _, _>>` to call this.
    pub(crate) fn acquire(self: Arc<Self>, key: K) -> Acquisition<K, V, E> {
        let mut guard = self.in_flight.lock();
        match guard.get_mut(&key) {
            Some(record) => {
                let (tx, rx) = oneshot::channel();
                record.waiters.push(tx);
                Acquisition::Waiter(rx)
            }
            None => {
                guard.insert(key.clone(), InFlightRecord { waiters: Vec::new() });
                drop(guard);
                Acquisition::Owner(OwnerGuard::new(self, key))
            }
        }
    }

    /// Removes `key`'s in-flight record and hands its waiters off to the
    /// Replier. Called by the owner (directly, via `OwnerGuard::release`) or
    /// by `OwnerGuard::drop` when the owner vanished unreleased.
    fn release(&self, key: &K, result: WaitOutcome<V, E>) {
        let waiters = {
            let mut guard = self.in_flight.lock();
            match guard.remove(key) {
                Some(record) => record.waiters,
                None => return,
            }
        };
        // `send` on an unbounded channel is synchronous and non-blocking —
        // safe to call here, and safe to call from `Drop`.
        let _ = self.reply_tx.send(ReplyJob { waiters, result });
    }
}

/// RAII realization of "liveness observation": an owner that never calls
/// `release` (because its future panicked, was cancelled, or its task was
/// aborted) still has its key released — with a synthesized `OwnerFailure`
/// — the moment this guard is dropped. If a producer task was handed to
/// `track`, that task is aborted too, so a cancelled owner never leaves an
/// orphaned producer running in the background.
pub(crate) struct OwnerGuard<K, V, E>
where
    K: Eq + Hash + Clone,
{
    lock: Arc<KeyLock<K, V, E>>,
    key: Option<K>,
    producer: Option<tokio::task::AbortHandle>,
}

impl<K, V, E> OwnerGuard<K, V, E>
where
    K: Eq + Hash + Clone,
{
    fn new(lock: Arc<KeyLock<K, V, E>>, key: K) -> Self {
        Self {
            lock,
            key: Some(key),
            producer: None,
        }
    }

    /// Registers the spawned producer task so it gets aborted if this guard
    /// is dropped without an explicit `release` (owner cancelled before the
    /// producer finished). Harmless to call after the task has already
    /// finished — `AbortHandle::abort` on a completed task is a no-op.
    pub(crate) fn track(&mut self, producer: tokio::task::AbortHandle) {
        self.producer = Some(producer);
    }

    /// Explicitly releases the key with `result`, disarming the drop-time
    /// synthesized failure. Must be called exactly once on every path that
    /// doesn't let the guard fall out of scope unreleased.
    pub(crate) fn release(mut self, result: WaitOutcome<V, E>) {
        if let Some(key) = self.key.take() {
            self.lock.release(&key, result);
        }
    }
}

impl<K, V, E> Drop for OwnerGuard<K, V, E>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        if let Some(key) = self.key.take() {
            self.lock.release(&key, WaitOutcome::Err(CacheError::OwnerFailure));
        }
    }
}
