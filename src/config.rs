//! Cache configuration
//!
//! [`CacheConfig`] is meant to be embedded inside a host application's own
//! configuration tree, the same way `mcp-gateway`'s `CacheConfig` sits
//! inside its top-level `Config` — deserialize it with `serde`, fold it into
//! whatever layered config loader (file + env) the host already uses, then
//! hand the resulting value to [`crate::Cache::start`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-call expiration for [`crate::Cache::put`] and [`crate::Cache::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The entry never expires.
    Never,
    /// The entry expires `duration` after it is installed. `duration` must
    /// be positive.
    After(Duration),
}

impl From<Duration> for Expiration {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of independent partitions (shards). Must be at least 1.
    pub partitions: usize,
    /// How often each partition's background purger sweeps for expired
    /// entries. `None` disables background purging entirely; lookups still
    /// honor deadlines observationally.
    #[serde(with = "humantime_serde::option")]
    pub purge_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            partitions: 1,
            purge_interval: Some(Duration::from_secs(30)),
        }
    }
}

/// Hand-rolled human-readable `Duration` (de)serialization, so the config
/// struct stays embeddable in a YAML/env-based host config without pulling
/// in an extra crate purely for this.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    fn format(duration: &Duration) -> String {
        let ms = duration.as_millis();
        if ms % 1000 == 0 {
            format!("{}s", ms / 1000)
        } else {
            format!("{ms}ms")
        }
    }

    fn parse<E: serde::de::Error>(s: &str) -> std::result::Result<Duration, E> {
        if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>().map(Duration::from_secs).map_err(E::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(E::custom)
        } else if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>().map(Duration::from_millis).map_err(E::custom)
        } else {
            s.parse::<u64>().map(Duration::from_secs).map_err(E::custom)
        }
    }

    /// `serde(with = "humantime_serde::option")` for `Option<Duration>`.
    pub mod option {
        use super::{format, parse};
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&format(d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let maybe: Option<String> = Option::deserialize(deserializer)?;
            maybe.map(|s| parse(&s)).transpose()
        }
    }

    #[allow(dead_code)]
    pub fn serialize<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(duration))
    }

    #[allow(dead_code)]
    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s)
    }
}
