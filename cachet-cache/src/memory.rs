//! In-memory cache store for tests and composition roots that want no disk.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cachet_core::{CacheConfig, CachetResult, PayloadEncoding, Timestamp};
use chrono::Utc;

use crate::cipher::PayloadCipher;
use crate::key::CacheKey;
use crate::store::{
    decode_entry, encode_entry, entry_is_expired, CacheStats, CacheStore, Cacheable,
};

/// Cache store over a locked hash map.
///
/// Entries go through the same codec as the durable backend, so encryption
/// and expiry behave identically; only durability differs.
pub struct MemoryCacheStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    stats: Arc<RwLock<CacheStats>>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    config: CacheConfig,
}

impl MemoryCacheStore {
    /// Create an empty store with default configuration and no cipher.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create an empty store with the given configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
            cipher: None,
            config,
        }
    }

    /// Attach a payload cipher, enabling `Encrypted` entries.
    pub fn with_cipher(mut self, cipher: Arc<dyn PayloadCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn namespaced(&self, key: &CacheKey) -> String {
        format!("{}/{}", self.config.namespace, key.as_str())
    }

    fn record_hit(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.misses += 1;
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn store<T: Cacheable>(
        &self,
        value: &T,
        key: &CacheKey,
        ttl_minutes: Option<i64>,
        encoding: PayloadEncoding,
    ) {
        let ttl = ttl_minutes.unwrap_or(self.config.default_ttl_minutes);
        let Some(bytes) = encode_entry(value, key, ttl, encoding, self.cipher.as_deref()) else {
            return;
        };
        if let Ok(mut entries) = self.entries.write() {
            let is_new = entries.insert(self.namespaced(key), bytes).is_none();
            if is_new {
                if let Ok(mut stats) = self.stats.write() {
                    stats.entry_count += 1;
                }
            }
        }
    }

    async fn retrieve<T: Cacheable>(&self, key: &CacheKey) -> Option<(T, Timestamp)> {
        let bytes = self
            .entries
            .read()
            .ok()
            .and_then(|m| m.get(&self.namespaced(key)).cloned());
        let decoded = bytes.and_then(|bytes| decode_entry(&bytes, self.cipher.as_deref()));
        if decoded.is_some() {
            self.record_hit();
        } else {
            self.record_miss();
        }
        decoded
    }

    async fn clear_all(&self, prefix: &str) -> CachetResult<u64> {
        let full_prefix = format!("{}/{}", self.config.namespace, prefix);
        let mut removed = 0u64;
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|stored_key, _| {
                let sweep = stored_key.starts_with(&full_prefix);
                if sweep {
                    removed += 1;
                }
                !sweep
            });
        }
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = stats.entry_count.saturating_sub(removed);
            stats.swept += removed;
        }
        Ok(removed)
    }

    async fn purge_expired(&self) -> CachetResult<u64> {
        let now = Utc::now();
        let mut removed = 0u64;
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|_, bytes| {
                let expired = entry_is_expired(bytes, now);
                if expired {
                    removed += 1;
                }
                !expired
            });
        }
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = stats.entry_count.saturating_sub(removed);
            stats.swept += removed;
        }
        Ok(removed)
    }

    async fn stats(&self) -> CacheStats {
        self.stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}
