//! The persistent record contract and its binary key format.

use cachet_core::{EntityKind, RecordId};
use serde::{de::DeserializeOwned, Serialize};

/// A domain object the persistence manager can own.
///
/// # Implementation Requirements
///
/// - `kind()` must return a consistent value for all instances
/// - `record_id()` must return the stable identifier for this instance
/// - `sort_key()` defines the documented default ordering for sorted
///   fetches (a natural key, not insertion order)
/// - `draft(id)` builds a fresh, uncommitted instance for `create`; the
///   caller populates fields and must explicitly commit
pub trait PersistentRecord:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The entity kind for this record type.
    fn kind() -> EntityKind;

    /// The stable identifier for this instance.
    fn record_id(&self) -> RecordId;

    /// Natural key used when a sorted fetch is requested.
    fn sort_key(&self) -> String;

    /// Build a fresh uncommitted instance carrying the given id.
    fn draft(id: RecordId) -> Self;
}

/// Encode the container key for a record.
///
/// # Binary Format
///
/// Fixed 17 bytes: `[kind discriminant: 1 byte][record id: 16 bytes]`.
/// Keys sort by kind first, so a single-kind scan is one contiguous range,
/// and within a kind by id - UUIDv7 ids make that creation order.
pub fn record_key(kind: EntityKind, id: RecordId) -> [u8; 17] {
    let mut key = [0u8; 17];
    key[0] = kind.as_byte();
    key[1..17].copy_from_slice(id.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::new_record_id;

    #[test]
    fn test_key_layout() {
        let id = new_record_id();
        let key = record_key(EntityKind::Profile, id);
        assert_eq!(key[0], EntityKind::Profile.as_byte());
        assert_eq!(&key[1..17], id.as_bytes());
    }

    #[test]
    fn test_keys_group_by_kind() {
        let id = new_record_id();
        let a = record_key(EntityKind::Bookmark, id);
        let b = record_key(EntityKind::Profile, id);
        assert!(a < b, "kinds with lower discriminants sort first");
    }

    #[test]
    fn test_same_kind_sorts_by_creation() {
        let earlier = record_key(EntityKind::Bookmark, new_record_id());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = record_key(EntityKind::Bookmark, new_record_id());
        assert!(earlier < later);
    }
}
