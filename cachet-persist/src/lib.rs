//! Persistence manager over a transactional local record container.
//!
//! CRUD access runs through two execution contexts: reads go straight to
//! the container and may run concurrently; every mutation passes through
//! the single serialized write gate and commits atomically. Each committed
//! mutation emits a [`ChangeEvent`](cachet_core::ChangeEvent) onto the
//! process-wide [`ChangeBus`], and per-kind live-query controllers re-emit
//! `ItemChanged`/`BatchCompleted` so subscribers can tell incremental
//! updates from whole-result-set changes.
//!
//! Write-path failures always propagate. The container is owned exclusively
//! by the manager once constructed; callers hold copies of records, never
//! live handles into the store.

pub mod batch;
pub mod bus;
pub mod container;
pub mod lmdb;
pub mod live_query;
pub mod manager;
pub mod record;

pub use batch::WriteBatch;
pub use bus::ChangeBus;
pub use container::{ContainerOp, MemoryContainer, RecordContainer};
pub use lmdb::LmdbContainer;
pub use live_query::{LiveQueryHub, QueryState};
pub use manager::PersistenceManager;
pub use record::{record_key, PersistentRecord};
