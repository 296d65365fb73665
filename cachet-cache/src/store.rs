//! Cache store contract and the entry codec shared by its backends.

use async_trait::async_trait;
use cachet_core::{CachetResult, PayloadEncoding, Timestamp};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cipher::PayloadCipher;
use crate::entry::ExpiringEntry;
use crate::key::CacheKey;

/// Marker for values that can live in the cache.
///
/// Any serializable, thread-safe type qualifies; the blanket impl below
/// covers it. `value_type_name` is recorded on entries for diagnostics only.
pub trait Cacheable: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Diagnostic type name stored alongside the payload.
    fn value_type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses (absent, expired, or undecodable).
    pub misses: u64,
    /// Number of entries currently stored, expired ones included.
    pub entry_count: u64,
    /// Entries dropped by `clear_all` and `purge_expired` sweeps.
    pub swept: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Keyed storage contract for TTL-bounded serialized values.
///
/// Implementations must be safe for concurrent invocation; the underlying
/// medium is a process-wide singleton guarded by the backend's own critical
/// sections.
///
/// # Failure Semantics
///
/// `store` never fails the caller: serialization and encryption problems
/// are logged and dropped (no-op). `retrieve` never fails either; absence,
/// expiry, and corrupt or undecryptable payloads are all `None`. Only the
/// maintenance operations surface substrate errors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Serialize, optionally encrypt, and persist `value` under `key`,
    /// overwriting any existing entry. `ttl_minutes` of `None` applies the
    /// configured default; zero or negative stores an already-expired entry.
    async fn store<T: Cacheable>(
        &self,
        value: &T,
        key: &CacheKey,
        ttl_minutes: Option<i64>,
        encoding: PayloadEncoding,
    );

    /// Load the live value under `key`, along with when it was written.
    /// Expired entries are treated as absent, not purged.
    async fn retrieve<T: Cacheable>(&self, key: &CacheKey) -> Option<(T, Timestamp)>;

    /// Remove every entry whose composed key starts with `prefix`.
    /// Returns the number of entries removed.
    async fn clear_all(&self, prefix: &str) -> CachetResult<u64>;

    /// Drop entries whose expiry has passed. Optional maintenance; lazy
    /// expiry alone keeps reads correct.
    async fn purge_expired(&self) -> CachetResult<u64>;

    /// Current hit/miss counters.
    async fn stats(&self) -> CacheStats;
}

/// Serialize a value into stored entry bytes.
///
/// Returns `None` (after logging) when the value cannot be serialized or
/// the requested encoding cannot be honored - the caller treats that as a
/// silent no-store.
pub(crate) fn encode_entry<T: Cacheable>(
    value: &T,
    key: &CacheKey,
    ttl_minutes: i64,
    encoding: PayloadEncoding,
    cipher: Option<&dyn PayloadCipher>,
) -> Option<Vec<u8>> {
    let serialized = match serde_json::to_vec(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Dropping cache store: value failed to serialize");
            return None;
        }
    };

    let payload = match encoding {
        PayloadEncoding::Plain => serialized,
        PayloadEncoding::Encrypted => {
            let Some(cipher) = cipher else {
                warn!(key = %key, "Dropping cache store: encrypted encoding requested with no cipher");
                return None;
            };
            match cipher.encrypt(&serialized) {
                Some(sealed) => sealed,
                None => {
                    warn!(key = %key, "Dropping cache store: cipher refused payload");
                    return None;
                }
            }
        }
    };

    let entry = ExpiringEntry::new(
        key.as_str(),
        payload,
        ttl_minutes,
        encoding,
        T::value_type_name(),
    );
    match serde_json::to_vec(&entry) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(key = %key, error = %e, "Dropping cache store: entry failed to serialize");
            None
        }
    }
}

/// Decode stored entry bytes back into a live value.
///
/// Every failure mode - undecodable entry, expiry, missing payload, cipher
/// refusal, value deserialization failure - is a miss, not an error.
pub(crate) fn decode_entry<T: Cacheable>(
    bytes: &[u8],
    cipher: Option<&dyn PayloadCipher>,
) -> Option<(T, Timestamp)> {
    let entry: ExpiringEntry = match serde_json::from_slice(bytes) {
        Ok(entry) => entry,
        Err(e) => {
            debug!(error = %e, "Treating undecodable cache entry as a miss");
            return None;
        }
    };

    let payload = entry.live_payload(Utc::now())?;

    let plaintext = match entry.encoding {
        PayloadEncoding::Plain => payload.to_vec(),
        PayloadEncoding::Encrypted => {
            let cipher = cipher?;
            match cipher.decrypt(payload) {
                Some(plain) => plain,
                None => {
                    debug!(key = %entry.key, "Treating undecryptable cache entry as a miss");
                    return None;
                }
            }
        }
    };

    match serde_json::from_slice(&plaintext) {
        Ok(value) => Some((value, entry.created_at)),
        Err(e) => {
            debug!(key = %entry.key, error = %e, "Treating undeserializable cache payload as a miss");
            None
        }
    }
}

/// Whether stored entry bytes describe an expired entry.
///
/// Undecodable bytes count as expired so sweeps also collect corrupt slots.
pub(crate) fn entry_is_expired(bytes: &[u8], now: Timestamp) -> bool {
    match serde_json::from_slice::<ExpiringEntry>(bytes) {
        Ok(entry) => entry.is_expired(now),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::NoopCipher;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u32,
        label: String,
    }

    fn sample() -> Sample {
        Sample {
            id: 7,
            label: "seven".to_string(),
        }
    }

    #[test]
    fn test_plain_codec_roundtrip() {
        let key = CacheKey::simple("sample");
        let bytes =
            encode_entry(&sample(), &key, 60, PayloadEncoding::Plain, None).expect("encode");
        let (value, created_at) = decode_entry::<Sample>(&bytes, None).expect("decode");
        assert_eq!(value, sample());
        assert!(created_at <= Utc::now());
    }

    #[test]
    fn test_encrypted_without_cipher_is_a_silent_no_store() {
        let key = CacheKey::simple("sample");
        assert!(encode_entry(&sample(), &key, 60, PayloadEncoding::Encrypted, None).is_none());
    }

    #[test]
    fn test_encrypted_codec_roundtrip() {
        let key = CacheKey::simple("sample");
        let cipher = NoopCipher;
        let bytes = encode_entry(
            &sample(),
            &key,
            60,
            PayloadEncoding::Encrypted,
            Some(&cipher),
        )
        .expect("encode");
        let (value, _) = decode_entry::<Sample>(&bytes, Some(&cipher)).expect("decode");
        assert_eq!(value, sample());
    }

    #[test]
    fn test_encrypted_entry_without_cipher_reads_as_miss() {
        let key = CacheKey::simple("sample");
        let cipher = NoopCipher;
        let bytes = encode_entry(
            &sample(),
            &key,
            60,
            PayloadEncoding::Encrypted,
            Some(&cipher),
        )
        .expect("encode");
        assert!(decode_entry::<Sample>(&bytes, None).is_none());
    }

    #[test]
    fn test_expired_entry_reads_as_miss() {
        let key = CacheKey::simple("sample");
        let bytes = encode_entry(&sample(), &key, 0, PayloadEncoding::Plain, None).expect("encode");
        assert!(decode_entry::<Sample>(&bytes, None).is_none());
        assert!(entry_is_expired(&bytes, Utc::now()));
    }

    #[test]
    fn test_corrupt_bytes_read_as_miss() {
        assert!(decode_entry::<Sample>(b"not json", None).is_none());
        assert!(entry_is_expired(b"not json", Utc::now()));
    }

    #[test]
    fn test_wrong_type_reads_as_miss() {
        let key = CacheKey::simple("sample");
        let bytes =
            encode_entry(&sample(), &key, 60, PayloadEncoding::Plain, None).expect("encode");
        assert!(decode_entry::<Vec<u64>>(&bytes, None).is_none());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
