//! LMDB-backed durable cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) as the simple persistent
//! key-value substrate. All entries live under the configured namespace
//! prefix, distinct from any other use of the same environment, so
//! `clear_all` can safely sweep only cache-owned keys.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses read transactions for
//! `retrieve` and write transactions for `store` and the sweeps; hit/miss
//! counters sit behind their own lock.

use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cachet_core::{CacheConfig, CacheError, CachetResult, PayloadEncoding, Timestamp};
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::warn;

use crate::cipher::PayloadCipher;
use crate::key::CacheKey;
use crate::store::{
    decode_entry, encode_entry, entry_is_expired, CacheStats, CacheStore, Cacheable,
};

/// Durable cache store over a memory-mapped LMDB environment.
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    stats: Arc<RwLock<CacheStats>>,
    cipher: Option<Arc<dyn PayloadCipher>>,
    config: CacheConfig,
}

impl LmdbCacheStore {
    /// Open (or create) the cache environment at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, config: CacheConfig) -> Result<Self, CacheError> {
        let path_display = path.as_ref().display().to_string();
        std::fs::create_dir_all(&path).map_err(|e| CacheError::EnvOpen {
            path: path_display.clone(),
            reason: e.to_string(),
        })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| CacheError::EnvOpen {
            path: path_display,
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(|e| CacheError::Transaction {
            reason: e.to_string(),
        })?;
        let db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, None)
                .map_err(|e| CacheError::Transaction {
                    reason: e.to_string(),
                })?;
        wtxn.commit().map_err(|e| CacheError::Transaction {
            reason: e.to_string(),
        })?;

        Ok(Self {
            env,
            db,
            stats: Arc::new(RwLock::new(CacheStats::default())),
            cipher: None,
            config,
        })
    }

    /// Attach a payload cipher, enabling `Encrypted` entries.
    pub fn with_cipher(mut self, cipher: Arc<dyn PayloadCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    fn namespaced(&self, key: &CacheKey) -> Vec<u8> {
        format!("{}/{}", self.config.namespace, key.as_str()).into_bytes()
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

    fn note_swept(&self, removed: u64) {
        if let Ok(mut stats) = self.stats.write() {
            stats.entry_count = stats.entry_count.saturating_sub(removed);
            stats.swept += removed;
        }
    }

    /// Collect stored keys matching a raw byte prefix.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, CacheError> {
        let rtxn = self.env.read_txn().map_err(|e| CacheError::Transaction {
            reason: e.to_string(),
        })?;

        let mut keys = Vec::new();
        let iter = self.db.iter(&rtxn).map_err(|e| CacheError::Transaction {
            reason: e.to_string(),
        })?;
        for result in iter {
            if let Ok((key, _)) = result {
                if key.len() >= prefix.len() && &key[..prefix.len()] == prefix {
                    keys.push(key.to_vec());
                }
            }
        }
        Ok(keys)
    }

    fn delete_keys(&self, keys: &[Vec<u8>]) -> Result<u64, CacheError> {
        let mut wtxn = self.env.write_txn().map_err(|e| CacheError::Transaction {
            reason: e.to_string(),
        })?;
        let mut deleted = 0u64;
        for key in keys {
            if self.db.delete(&mut wtxn, key).unwrap_or(false) {
                deleted += 1;
            }
        }
        wtxn.commit().map_err(|e| CacheError::Transaction {
            reason: e.to_string(),
        })?;
        Ok(deleted)
    }
}

#[async_trait]
impl CacheStore for LmdbCacheStore {
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
        let stored_key = self.namespaced(key);

        // Substrate failures are also a logged no-op on this path.
        let result = (|| -> Result<bool, heed::Error> {
            let is_new = {
                let rtxn = self.env.read_txn()?;
                self.db.get(&rtxn, &stored_key)?.is_none()
            };
            let mut wtxn = self.env.write_txn()?;
            self.db.put(&mut wtxn, &stored_key, &bytes)?;
            wtxn.commit()?;
            Ok(is_new)
        })();

        match result {
            Ok(is_new) => {
                if is_new {
                    if let Ok(mut stats) = self.stats.write() {
                        stats.entry_count += 1;
                    }
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping cache store: LMDB write failed");
            }
        }
    }

    async fn retrieve<T: Cacheable>(&self, key: &CacheKey) -> Option<(T, Timestamp)> {
        let stored_key = self.namespaced(key);
        let bytes = match self.env.read_txn() {
            Ok(rtxn) => match self.db.get(&rtxn, &stored_key) {
                Ok(Some(bytes)) => Some(bytes.to_vec()),
                Ok(None) => None,
                Err(e) => {
                    warn!(key = %key, error = %e, "Treating LMDB read failure as a miss");
                    None
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Treating LMDB transaction failure as a miss");
                None
            }
        };

        let decoded = bytes.and_then(|bytes| decode_entry(&bytes, self.cipher.as_deref()));
        if decoded.is_some() {
            self.record_hit();
        } else {
            self.record_miss();
        }
        decoded
    }

    async fn clear_all(&self, prefix: &str) -> CachetResult<u64> {
        let full_prefix = format!("{}/{}", self.config.namespace, prefix).into_bytes();
        let keys = self.collect_keys_with_prefix(&full_prefix)?;
        let deleted = self.delete_keys(&keys)?;
        self.note_swept(deleted);
        Ok(deleted)
    }

    async fn purge_expired(&self) -> CachetResult<u64> {
        let now = Utc::now();
        let namespace_prefix = format!("{}/", self.config.namespace).into_bytes();

        let expired: Vec<Vec<u8>> = {
            let rtxn = self.env.read_txn().map_err(|e| CacheError::Transaction {
                reason: e.to_string(),
            })?;
            let iter = self.db.iter(&rtxn).map_err(|e| CacheError::Transaction {
                reason: e.to_string(),
            })?;
            iter.filter_map(|result| result.ok())
                .filter(|(key, _)| key.starts_with(&namespace_prefix))
                .filter(|(_, bytes)| entry_is_expired(bytes, now))
                .map(|(key, _)| key.to_vec())
                .collect()
        };

        let deleted = self.delete_keys(&expired)?;
        self.note_swept(deleted);
        Ok(deleted)
    }

    async fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Article {
        id: u64,
        title: String,
    }

    fn open_store(dir: &tempfile::TempDir) -> LmdbCacheStore {
        LmdbCacheStore::open(dir.path(), CacheConfig::default()).expect("open store")
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = CacheKey::compose("article", &[&9u64]);
        let article = Article {
            id: 9,
            title: "durable".to_string(),
        };

        {
            let store = open_store(&dir);
            store
                .store(&article, &key, Some(60), PayloadEncoding::Plain)
                .await;
        }

        let store = open_store(&dir);
        let (value, _) = store.retrieve::<Article>(&key).await.expect("hit");
        assert_eq!(value, article);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss_but_not_purged_on_read() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);
        let key = CacheKey::simple("stale");
        store.store(&1u8, &key, Some(0), PayloadEncoding::Plain).await;

        assert!(store.retrieve::<u8>(&key).await.is_none());
        // Still on disk until an explicit sweep.
        assert_eq!(store.purge_expired().await.expect("purge"), 1);
        assert_eq!(store.purge_expired().await.expect("purge"), 0);
    }

    #[tokio::test]
    async fn test_clear_all_respects_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = open_store(&dir);
        let a = CacheKey::compose("feed", &[&"one"]);
        let b = CacheKey::compose("feed", &[&"two"]);
        let c = CacheKey::simple("profile");
        for key in [&a, &b, &c] {
            store.store(&0u8, key, Some(60), PayloadEncoding::Plain).await;
        }

        assert_eq!(store.clear_all("feed").await.expect("clear"), 2);
        assert!(store.retrieve::<u8>(&a).await.is_none());
        assert!(store.retrieve::<u8>(&c).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_reads_and_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(open_store(&dir));

        let mut handles = Vec::new();
        for i in 0..8u64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let key = CacheKey::compose("worker", &[&i]);
                store.store(&i, &key, Some(60), PayloadEncoding::Plain).await;
                store.retrieve::<u64>(&key).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let hit = handle.await.expect("join").expect("hit");
            assert_eq!(hit.0, i as u64);
        }
    }
}
