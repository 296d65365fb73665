//! Record container contract and the in-memory implementation.
//!
//! A container is the raw transactional substrate under the persistence
//! manager: byte-level get/scan plus an atomic multi-operation apply. It
//! must never be mutated around the manager's write gate.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use cachet_core::{EntityKind, PersistError, RecordId};

use crate::record::record_key;

/// One operation inside an atomic apply.
#[derive(Debug, Clone)]
pub enum ContainerOp {
    /// Insert or overwrite the record bytes under `(kind, id)`.
    Put {
        kind: EntityKind,
        id: RecordId,
        bytes: Vec<u8>,
    },
    /// Remove the record under `(kind, id)`. Removing an absent key is
    /// fine; idempotence is handled above this layer.
    Delete { kind: EntityKind, id: RecordId },
}

/// Transactional byte-level store for persistent records.
///
/// `apply` is the only mutation path and must be all-or-nothing: either
/// every operation in the slice commits or none do. Reads always observe
/// the latest committed state.
pub trait RecordContainer: Send + Sync {
    /// Fetch the bytes for one record.
    fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<Vec<u8>>, PersistError>;

    /// Fetch the bytes of every record of `kind`, in key order.
    fn scan(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>, PersistError>;

    /// Commit all operations atomically.
    fn apply(&self, ops: &[ContainerOp]) -> Result<(), PersistError>;
}

/// Container over a locked ordered map, for tests and ephemeral setups.
///
/// The write lock held across `apply` makes the multi-op commit atomic
/// with respect to readers.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    records: Arc<RwLock<BTreeMap<[u8; 17], Vec<u8>>>>,
}

impl MemoryContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all kinds.
    pub fn len(&self) -> usize {
        self.records.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the container holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordContainer for MemoryContainer {
    fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<Vec<u8>>, PersistError> {
        let records = self.records.read().map_err(|_| PersistError::FetchFailed {
            kind,
            reason: "container lock poisoned".to_string(),
        })?;
        Ok(records.get(&record_key(kind, id)).cloned())
    }

    fn scan(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>, PersistError> {
        let records = self.records.read().map_err(|_| PersistError::FetchFailed {
            kind,
            reason: "container lock poisoned".to_string(),
        })?;
        let lower = record_key(kind, RecordId::nil());
        let upper = record_key(kind, RecordId::max());
        Ok(records
            .range(lower..=upper)
            .map(|(_, bytes)| bytes.clone())
            .collect())
    }

    fn apply(&self, ops: &[ContainerOp]) -> Result<(), PersistError> {
        let mut records = self.records.write().map_err(|_| PersistError::CommitFailed {
            reason: "container lock poisoned".to_string(),
        })?;
        for op in ops {
            match op {
                ContainerOp::Put { kind, id, bytes } => {
                    records.insert(record_key(*kind, *id), bytes.clone());
                }
                ContainerOp::Delete { kind, id } => {
                    records.remove(&record_key(*kind, *id));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachet_core::new_record_id;

    #[test]
    fn test_put_get_delete() {
        let container = MemoryContainer::new();
        let id = new_record_id();

        container
            .apply(&[ContainerOp::Put {
                kind: EntityKind::Bookmark,
                id,
                bytes: b"record".to_vec(),
            }])
            .expect("apply");
        assert_eq!(
            container.get(EntityKind::Bookmark, id).expect("get"),
            Some(b"record".to_vec())
        );

        container
            .apply(&[ContainerOp::Delete {
                kind: EntityKind::Bookmark,
                id,
            }])
            .expect("apply");
        assert_eq!(container.get(EntityKind::Bookmark, id).expect("get"), None);
    }

    #[test]
    fn test_scan_is_kind_scoped() {
        let container = MemoryContainer::new();
        container
            .apply(&[
                ContainerOp::Put {
                    kind: EntityKind::Bookmark,
                    id: new_record_id(),
                    bytes: b"a".to_vec(),
                },
                ContainerOp::Put {
                    kind: EntityKind::Profile,
                    id: new_record_id(),
                    bytes: b"b".to_vec(),
                },
            ])
            .expect("apply");

        assert_eq!(container.scan(EntityKind::Bookmark).expect("scan").len(), 1);
        assert_eq!(container.scan(EntityKind::Profile).expect("scan").len(), 1);
        assert_eq!(container.scan(EntityKind::Document).expect("scan").len(), 0);
    }

    #[test]
    fn test_apply_batches_multiple_ops() {
        let container = MemoryContainer::new();
        let keep = new_record_id();
        let drop_id = new_record_id();
        container
            .apply(&[ContainerOp::Put {
                kind: EntityKind::Document,
                id: drop_id,
                bytes: b"old".to_vec(),
            }])
            .expect("apply");

        container
            .apply(&[
                ContainerOp::Put {
                    kind: EntityKind::Document,
                    id: keep,
                    bytes: b"new".to_vec(),
                },
                ContainerOp::Delete {
                    kind: EntityKind::Document,
                    id: drop_id,
                },
            ])
            .expect("apply");

        assert_eq!(container.len(), 1);
        assert!(container.get(EntityKind::Document, keep).expect("get").is_some());
    }
}
