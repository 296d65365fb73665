//! Configuration types.

use serde::{Deserialize, Serialize};

/// Default time-to-live for cached entries, in minutes (24 hours).
pub const DEFAULT_TTL_MINUTES: i64 = 24 * 60;

/// Configuration for the expiring key-value cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL in minutes applied when a store call does not supply one.
    pub default_ttl_minutes: i64,
    /// Fixed key-prefix namespace under which all cache entries live,
    /// distinct from any other use of the same underlying medium.
    pub namespace: String,
    /// Maximum size of the backing map in megabytes (durable backends only).
    pub max_size_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_minutes: DEFAULT_TTL_MINUTES,
            namespace: "cache".to_string(),
            max_size_mb: 100,
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL in minutes.
    pub fn with_default_ttl_minutes(mut self, minutes: i64) -> Self {
        self.default_ttl_minutes = minutes;
        self
    }

    /// Set the cache namespace prefix.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the maximum backing-map size in megabytes.
    pub fn with_max_size_mb(mut self, mb: usize) -> Self {
        self.max_size_mb = mb;
        self
    }
}

/// Configuration for the persistent record container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistConfig {
    /// Directory where the container's files live.
    pub path: String,
    /// Maximum size of the container in megabytes.
    pub max_size_mb: usize,
    /// Capacity of the change-event broadcast buffer.
    pub event_buffer: usize,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            path: "cachet-data".to_string(),
            max_size_mb: 256,
            event_buffer: 1024,
        }
    }
}

impl PersistConfig {
    /// Create a new persist config rooted at the given path.
    pub fn at_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the maximum container size in megabytes.
    pub fn with_max_size_mb(mut self, mb: usize) -> Self {
        self.max_size_mb = mb;
        self
    }

    /// Set the change-event broadcast buffer capacity.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttl_is_24_hours() {
        assert_eq!(CacheConfig::default().default_ttl_minutes, 1440);
    }

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::new()
            .with_default_ttl_minutes(30)
            .with_namespace("feed-cache")
            .with_max_size_mb(10);
        assert_eq!(config.default_ttl_minutes, 30);
        assert_eq!(config.namespace, "feed-cache");
        assert_eq!(config.max_size_mb, 10);
    }

    #[test]
    fn test_persist_config_builder() {
        let config = PersistConfig::at_path("/tmp/records")
            .with_max_size_mb(64)
            .with_event_buffer(128);
        assert_eq!(config.path, "/tmp/records");
        assert_eq!(config.max_size_mb, 64);
        assert_eq!(config.event_buffer, 128);
    }
}
