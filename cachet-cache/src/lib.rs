//! Expiring key-value cache store and cache-policy request orchestration.
//!
//! This crate mediates between a remote data source and a durable, TTL-bounded
//! local cache. Callers pick a [`CachePolicy`](cachet_core::CachePolicy) per
//! request and receive a finite result channel that satisfies the policy's
//! contract: at most two successful emissions (cache, then network) or one
//! failure.
//!
//! # Design Philosophy
//!
//! Expiry is lazy: entries past their `expires_at` are treated as absent on
//! read, never actively purged there. [`CacheStore::purge_expired`] exists as
//! an explicit maintenance sweep for deployments that want one.
//!
//! Failure semantics follow the "safe default" rule: a store that cannot
//! serialize or encrypt logs and no-ops; a retrieve that finds a corrupt or
//! undecryptable payload degrades to a miss. Nothing on the cache path
//! crashes the caller.

pub mod cipher;
pub mod connectivity;
pub mod entry;
pub mod key;
pub mod lmdb;
pub mod memory;
pub mod orchestrator;
pub mod store;

pub use cipher::{NoopCipher, PayloadCipher};
pub use connectivity::{AlwaysOnline, ConnectivityProbe};
pub use entry::ExpiringEntry;
pub use key::CacheKey;
pub use lmdb::LmdbCacheStore;
pub use memory::MemoryCacheStore;
pub use orchestrator::{Delivery, Origin, RequestOrchestrator, RequestStream};
pub use store::{CacheStats, CacheStore, Cacheable};
