//! The persistence manager: typed CRUD over a record container.
//!
//! # Design
//!
//! Two execution contexts. Reads go straight to the container and may run
//! concurrently with each other. Every mutation passes through a single
//! serialized write gate, so existence pre-checks and the commit they guard
//! cannot interleave with another writer. Events are published only after
//! the container commit succeeds, so subscribers never observe a mutation
//! that was rolled back.
//!
//! # Errors
//!
//! Write-path failures always propagate to the caller. On the read path,
//! container failures propagate but individually corrupt records are
//! skipped with a warning; one bad record must not take down a listing.

use std::sync::Arc;

use cachet_core::{
    new_record_id, CachetResult, ChangeEvent, EntityKind, EventFilter, RecordId,
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::batch::WriteBatch;
use crate::bus::ChangeBus;
use crate::container::{ContainerOp, RecordContainer};
use crate::live_query::LiveQueryHub;
use crate::record::PersistentRecord;

/// Default per-subscriber event buffer when none is configured.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Typed persistence facade over a [`RecordContainer`].
///
/// The container is owned exclusively by the manager once constructed;
/// callers hold copies of records, never live handles into the store.
pub struct PersistenceManager<B: RecordContainer> {
    container: Arc<B>,
    write_gate: Mutex<()>,
    bus: ChangeBus,
    live_queries: LiveQueryHub,
}

impl<B: RecordContainer> PersistenceManager<B> {
    /// Wrap a container with the default event buffer.
    pub fn new(container: B) -> Self {
        Self::with_event_buffer(container, DEFAULT_EVENT_BUFFER)
    }

    /// Wrap a container with an explicit per-subscriber event buffer.
    pub fn with_event_buffer(container: B, event_buffer: usize) -> Self {
        let bus = ChangeBus::new(event_buffer);
        Self {
            container: Arc::new(container),
            write_gate: Mutex::new(()),
            live_queries: LiveQueryHub::new(bus.clone()),
            bus,
        }
    }

    // ==================== CREATE ====================

    /// Build a fresh uncommitted draft with a new id.
    ///
    /// Nothing is persisted and no event is emitted; populate the draft and
    /// pass it to [`save`](Self::save) to commit it.
    pub fn create<T: PersistentRecord>(&self) -> T {
        T::draft(new_record_id())
    }

    // ==================== READS ====================

    /// Fetch one record by id.
    ///
    /// A corrupt stored payload is treated as absent and logged.
    pub fn fetch_by_id<T: PersistentRecord>(&self, id: RecordId) -> CachetResult<Option<T>> {
        let bytes = self.container.get(T::kind(), id)?;
        Ok(bytes.and_then(|b| decode_record::<T>(&b)))
    }

    /// Fetch every record of `T` in creation order (the container's key
    /// order; v7 ids make that insertion time).
    ///
    /// Corrupt records are skipped with a warning.
    pub fn fetch_all<T: PersistentRecord>(&self) -> CachetResult<Vec<T>> {
        Ok(self
            .container
            .scan(T::kind())?
            .iter()
            .filter_map(|bytes| decode_record::<T>(bytes))
            .collect())
    }

    /// Fetch every record of `T`, sorted by its natural sort key instead
    /// of creation order.
    pub fn fetch_all_sorted<T: PersistentRecord>(&self) -> CachetResult<Vec<T>> {
        let mut records = self.fetch_all::<T>()?;
        records.sort_by_key(|r| r.sort_key());
        Ok(records)
    }

    /// Fetch the records of `T` matching `predicate`, in creation order.
    pub fn fetch_by<T, P>(&self, predicate: P) -> CachetResult<Vec<T>>
    where
        T: PersistentRecord,
        P: Fn(&T) -> bool,
    {
        let mut records = self.fetch_all::<T>()?;
        records.retain(|r| predicate(r));
        Ok(records)
    }

    // ==================== WRITES ====================

    /// Insert or overwrite one record atomically.
    ///
    /// Emits `Inserted` or `Updated` (decided by existence under the write
    /// gate) followed by `ItemChanged` for the kind.
    ///
    /// # Errors
    ///
    /// Serialization and commit failures propagate; nothing is emitted on
    /// failure.
    pub async fn save<T: PersistentRecord>(&self, record: &T) -> CachetResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(record)?;
        let ops = batch.into_ops();
        let id = record.record_id();

        let _gate = self.write_gate.lock().await;
        let existed = self.container.get(T::kind(), id)?.is_some();
        self.container.apply(&ops)?;

        let event = if existed {
            ChangeEvent::Updated { kind: T::kind(), id }
        } else {
            ChangeEvent::Inserted { kind: T::kind(), id }
        };
        self.bus.publish(event);
        self.live_queries.item_changed(T::kind());
        Ok(())
    }

    /// Remove one record. Idempotent: deleting an absent record is `Ok(false)`
    /// and emits nothing.
    pub async fn delete<T: PersistentRecord>(&self, id: RecordId) -> CachetResult<bool> {
        let _gate = self.write_gate.lock().await;
        if self.container.get(T::kind(), id)?.is_none() {
            debug!(kind = T::kind().as_str(), %id, "Delete of absent record");
            return Ok(false);
        }
        self.container
            .apply(&[ContainerOp::Delete { kind: T::kind(), id }])?;

        self.bus.publish(ChangeEvent::Deleted { kind: T::kind(), id });
        self.live_queries.item_changed(T::kind());
        Ok(true)
    }

    /// Remove every record of `T` matching `predicate`, as one atomic unit
    /// of work.
    ///
    /// Emits one `Deleted` per removed record and a single `BatchCompleted`
    /// for the kind; matching nothing emits nothing. Returns the number of
    /// records removed.
    pub async fn delete_all<T, P>(&self, predicate: P) -> CachetResult<u64>
    where
        T: PersistentRecord,
        P: Fn(&T) -> bool,
    {
        let _gate = self.write_gate.lock().await;
        let doomed: Vec<RecordId> = self
            .container
            .scan(T::kind())?
            .iter()
            .filter_map(|bytes| decode_record::<T>(bytes))
            .filter(|r| predicate(r))
            .map(|r| r.record_id())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let ops: Vec<ContainerOp> = doomed
            .iter()
            .map(|&id| ContainerOp::Delete { kind: T::kind(), id })
            .collect();
        self.container.apply(&ops)?;

        for &id in &doomed {
            self.bus.publish(ChangeEvent::Deleted { kind: T::kind(), id });
        }
        self.live_queries.batch_completed(T::kind());
        Ok(doomed.len() as u64)
    }

    /// Commit a staged unit of work atomically.
    ///
    /// Either every staged operation lands or none do. After the commit,
    /// one record-level event is emitted per effective operation (deletes
    /// of absent records emit nothing) followed by one `BatchCompleted` per
    /// touched kind. An empty batch is a no-op and emits nothing.
    pub async fn commit(&self, batch: WriteBatch) -> CachetResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();

        let _gate = self.write_gate.lock().await;
        let mut events = Vec::with_capacity(ops.len());
        let mut touched: Vec<EntityKind> = Vec::new();
        for op in &ops {
            match op {
                ContainerOp::Put { kind, id, .. } => {
                    let existed = self.container.get(*kind, *id)?.is_some();
                    events.push(if existed {
                        ChangeEvent::Updated { kind: *kind, id: *id }
                    } else {
                        ChangeEvent::Inserted { kind: *kind, id: *id }
                    });
                    if !touched.contains(kind) {
                        touched.push(*kind);
                    }
                }
                ContainerOp::Delete { kind, id } => {
                    if self.container.get(*kind, *id)?.is_some() {
                        events.push(ChangeEvent::Deleted { kind: *kind, id: *id });
                    }
                    if !touched.contains(kind) {
                        touched.push(*kind);
                    }
                }
            }
        }
        self.container.apply(&ops)?;

        for event in events {
            self.bus.publish(event);
        }
        for kind in touched {
            self.live_queries.batch_completed(kind);
        }
        Ok(())
    }

    // ==================== NOTIFICATIONS ====================

    /// Subscribe to the raw change-event stream.
    pub fn events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.bus.subscribe()
    }

    /// Subscribe with an allow-list filter.
    pub fn output(&self, filter: EventFilter) -> impl Stream<Item = ChangeEvent> {
        self.bus.output(filter)
    }

    /// The underlying bus, for wiring into other components.
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// The live-query registry, for lifecycle inspection.
    pub fn live_queries(&self) -> &LiveQueryHub {
        &self.live_queries
    }
}

fn decode_record<T: PersistentRecord>(bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(
                kind = T::kind().as_str(),
                error = %e,
                "Skipping corrupt stored record"
            );
            None
        }
    }
}
