//! Error types for the cache engine

use thiserror::Error;

/// Result type alias for setup/configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Setup and configuration errors — the things that can go wrong before a
/// [`crate::Cache`] is even handed its first key.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, e.g. zero partitions.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Per-read failure modes returned by [`crate::Cache::read`].
///
/// `E` is the caller-supplied producer error type. It must be `Clone` because
/// a single outcome is fanned out to every waiter that piled up behind the
/// owner, each of which needs its own owned copy.
#[derive(Error, Debug, Clone)]
pub enum CacheError<E> {
    /// The producer ran and returned an explicit application error.
    #[error("producer returned an error: {0}")]
    Producer(E),

    /// The producer panicked. The owner's call to `read` does not return
    /// this variant — it resumes the original panic instead. Only waiters
    /// observe `CallbackFailure`.
    #[error("producer panicked")]
    CallbackFailure,

    /// The owner's future was dropped or its task was aborted before it
    /// released the key.
    #[error("owner disappeared before releasing the key")]
    OwnerFailure,

    /// The producer succeeded (or a waiter was told to retry) but a
    /// subsequent lookup still missed, e.g. the entry was purged in the
    /// interim.
    #[error("value was not found on retry after a successful fill")]
    RetryFailure,

    /// The coordinator did not respond within the coordination safety-net
    /// timeout. This is not a normal outcome; it indicates a coordinator bug,
    /// not slow producer execution.
    #[error("single-flight coordinator timed out")]
    CoordinatorTimeout,
}
