//! CACHET Core - Shared Data Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no storage, no networking.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod config;
pub mod enums;
pub mod error;
pub mod event;

pub use config::{CacheConfig, PersistConfig, DEFAULT_TTL_MINUTES};
pub use enums::{CachePolicy, ChangeKind, EntityKind, PayloadEncoding};
pub use error::{
    CacheError, CachetError, CachetResult, ConfigError, FetchError, PersistError, RequestError,
};
pub use event::{ChangeEvent, EventFilter};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type RecordId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Raw serialized payload bytes.
pub type RawPayload = Vec<u8>;

/// Generate a new UUIDv7 RecordId (timestamp-sortable).
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_unique() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_ids_are_sortable_by_creation() {
        let earlier = new_record_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = new_record_id();
        assert!(earlier < later);
    }
}
