//! Staged unit of work for atomic multi-record commits.

use cachet_core::{CachetResult, EntityKind, PersistError, RecordId};

use crate::container::ContainerOp;
use crate::record::PersistentRecord;

/// A unit of work staged against the persistence manager.
///
/// Puts are serialized eagerly, so a malformed record fails at staging time
/// rather than poisoning the commit. Nothing touches the container until the
/// batch is handed to [`PersistenceManager::commit`](crate::PersistenceManager::commit),
/// where all staged operations land in a single atomic apply.
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<ContainerOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an insert-or-overwrite of `record`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the record cannot be encoded.
    pub fn put<T: PersistentRecord>(&mut self, record: &T) -> CachetResult<()> {
        let id = record.record_id();
        let bytes = serde_json::to_vec(record).map_err(|e| PersistError::Serialization {
            kind: T::kind(),
            id,
            reason: e.to_string(),
        })?;
        self.ops.push(ContainerOp::Put {
            kind: T::kind(),
            id,
            bytes,
        });
        Ok(())
    }

    /// Stage removal of the record of type `T` with the given id.
    pub fn delete<T: PersistentRecord>(&mut self, id: RecordId) {
        self.ops.push(ContainerOp::Delete { kind: T::kind(), id });
    }

    /// Stage removal by explicit kind, for callers working untyped.
    pub fn delete_by_kind(&mut self, kind: EntityKind, id: RecordId) {
        self.ops.push(ContainerOp::Delete { kind, id });
    }

    /// Whether nothing has been staged. Committing an empty batch is a
    /// no-op and emits no events.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn into_ops(self) -> Vec<ContainerOp> {
        self.ops
    }
}
