//! Flightcache
//!
//! An in-process, in-memory key/value cache built for high read throughput
//! and for suppressing cache stampedes on hot keys: for any given key, at
//! most one producer call runs at a time across the whole process, and every
//! concurrent caller waiting on that key observes the same terminal result.
//!
//! # Features
//!
//! - **Partitioned**: N independent shards, each with its own map, lock, and
//!   background purger — cross-partition operations never contend.
//! - **Single-flight reads**: [`Cache::read`] collapses concurrent misses for
//!   the same key into one producer invocation.
//! - **Stampede-unsafe fast path**: [`Cache::dirty_read`] is available when a
//!   caller explicitly wants to skip coordination.
//! - **Supervised fault handling**: a producer that panics, is cancelled, or
//!   simply vanishes still releases every waiter with a well-defined error.
//! - **Lazy, periodic expiration**: deadlines are honored on every lookup
//!   regardless of purge scheduling.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use flightcache::{Cache, CacheConfig, Expiration};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let cache: Cache<String, String, std::convert::Infallible> =
//!     Cache::start(CacheConfig::default()).await?;
//!
//! let value = cache
//!     .read("greeting".to_string(), Expiration::After(Duration::from_secs(60)), || async {
//!         Ok("hello".to_string())
//!     })
//!     .await?;
//! assert_eq!(value, "hello");
//!
//! cache.stop().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
mod keylock;
mod partition;
mod purger;
mod replier;
pub mod stats;
mod store;

pub use cache::Cache;
pub use config::{CacheConfig, Expiration};
pub use error::{CacheError, Error, Result};
pub use stats::CacheStatsSnapshot;

use std::time::Duration;

/// Safety-net bound on how long a waiter suspends for an owner's result
/// before giving up with [`CacheError::CoordinatorTimeout`]. This guards
/// against a coordinator bug — a waiter that never gets an answer at all —
/// not against ordinary producer latency, which is unbounded by this engine.
pub(crate) const COORDINATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Installs a `tracing` subscriber for applications embedding this crate
/// standalone (e.g. in examples and tests). Libraries built on top of
/// `flightcache` are expected to configure their own subscriber instead —
/// this is a convenience, not something `Cache::start` calls implicitly.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            let _ = subscriber.with(fmt::layer().json()).try_init();
        }
        _ => {
            let _ = subscriber.with(fmt::layer()).try_init();
        }
    }

    Ok(())
}
