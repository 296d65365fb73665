//! The on-disk record for one cached value.

use cachet_core::{PayloadEncoding, RawPayload, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Immutable-after-construction record for one cached value.
///
/// Invariant: `created_at <= expires_at`. A TTL of zero or less clamps
/// `expires_at` to `created_at`, so the entry is stored but already a miss
/// for any later read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiringEntry {
    /// The composed cache key this entry is stored under.
    pub key: String,
    /// The serialized (and possibly encrypted) value. `None` is equivalent
    /// to absent.
    pub payload: Option<RawPayload>,
    /// When this entry was written.
    pub created_at: Timestamp,
    /// When this entry stops being served.
    pub expires_at: Timestamp,
    /// Whether `payload` must be decrypted before use.
    pub encoding: PayloadEncoding,
    /// Concrete value type, diagnostic only - never used for dispatch.
    pub value_type_name: String,
}

impl ExpiringEntry {
    /// Create an entry expiring `ttl_minutes` from now.
    pub fn new(
        key: impl Into<String>,
        payload: RawPayload,
        ttl_minutes: i64,
        encoding: PayloadEncoding,
        value_type_name: impl Into<String>,
    ) -> Self {
        let created_at = Utc::now();
        let expires_at = created_at + chrono::Duration::minutes(ttl_minutes.max(0));
        Self {
            key: key.into(),
            payload: Some(payload),
            created_at,
            expires_at,
            encoding,
            value_type_name: value_type_name.into(),
        }
    }

    /// Whether this entry is expired as of `now`.
    ///
    /// Expiry is inclusive: an entry is a miss the instant `now` reaches
    /// `expires_at`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// The payload, unless the entry is logically absent or expired.
    pub fn live_payload(&self, now: Timestamp) -> Option<&[u8]> {
        if self.is_expired(now) {
            None
        } else {
            self.payload.as_deref()
        }
    }
}
