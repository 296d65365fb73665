//! CACHET Test Utilities
//!
//! Centralized test infrastructure for the CACHET workspace:
//! - Sample persistent record types (bookmarks, profiles)
//! - A scripted remote fetcher for driving the request orchestrator
//! - A switchable connectivity probe
//! - A real (if toy) symmetric cipher for exercising encryption-at-rest
//! - Proptest generators for core types

// Re-export core types for convenience
pub use cachet_core::{
    new_record_id, CacheConfig, CachePolicy, CachetError, CachetResult, ChangeEvent, ChangeKind,
    EntityKind, EventFilter, FetchError, PayloadEncoding, PersistConfig, RecordId,
};

use std::collections::VecDeque;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cachet_cache::{ConnectivityProbe, PayloadCipher};
use cachet_persist::PersistentRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// SAMPLE RECORDS
// ============================================================================

/// A saved link, the workhorse record type in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: RecordId,
    pub title: String,
    pub url: String,
    pub pinned: bool,
}

impl PersistentRecord for Bookmark {
    fn kind() -> EntityKind {
        EntityKind::Bookmark
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn sort_key(&self) -> String {
        self.title.clone()
    }

    fn draft(id: RecordId) -> Self {
        Self {
            id,
            title: String::new(),
            url: String::new(),
            pinned: false,
        }
    }
}

impl Bookmark {
    /// A populated bookmark ready to save.
    pub fn sample(title: &str) -> Self {
        Self {
            id: new_record_id(),
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            pinned: false,
        }
    }
}

/// A user profile, for multi-kind scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: RecordId,
    pub handle: String,
    pub display_name: String,
}

impl PersistentRecord for Profile {
    fn kind() -> EntityKind {
        EntityKind::Profile
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn sort_key(&self) -> String {
        self.handle.clone()
    }

    fn draft(id: RecordId) -> Self {
        Self {
            id,
            handle: String::new(),
            display_name: String::new(),
        }
    }
}

impl Profile {
    /// A populated profile ready to save.
    pub fn sample(handle: &str) -> Self {
        Self {
            id: new_record_id(),
            handle: handle.to_string(),
            display_name: handle.to_uppercase(),
        }
    }
}

// ============================================================================
// SCRIPTED FETCHER
// ============================================================================

/// A remote collaborator with a pre-scripted response queue.
///
/// Each call to the closure returned by [`fetch`](Self::fetch) pops the next
/// scripted response; an exhausted script answers with a transport error.
/// The call counter lets tests assert how many remote round trips a policy
/// actually made.
pub struct ScriptedFetcher<T> {
    responses: Mutex<VecDeque<Result<T, FetchError>>>,
    calls: AtomicU64,
}

impl<T: Clone + Send + 'static> ScriptedFetcher<T> {
    /// Script the given responses, served in order.
    pub fn new(responses: impl IntoIterator<Item = Result<T, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: AtomicU64::new(0),
        })
    }

    /// A fetcher that always succeeds with `value`.
    pub fn always(value: T) -> Arc<Self> {
        Self::new(std::iter::repeat_with(move || Ok(value.clone())).take(64))
    }

    /// A fetcher that always fails with a transport error.
    pub fn unreachable_host() -> Arc<Self> {
        Self::new(std::iter::empty())
    }

    /// Number of remote calls made so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Pop the next scripted response.
    pub fn next_response(&self) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(FetchError::Transport {
                    reason: "scripted responses exhausted".to_string(),
                })
            })
    }

    /// A one-shot fetch closure suitable for the request orchestrator.
    pub fn fetch(self: &Arc<Self>) -> impl FnOnce() -> Ready<Result<T, FetchError>> + Send + 'static {
        let this = Arc::clone(self);
        move || ready(this.next_response())
    }
}

// ============================================================================
// CONNECTIVITY
// ============================================================================

/// A probe tests can flip between online and offline.
#[derive(Debug, Default)]
pub struct SwitchProbe {
    online: AtomicBool,
}

impl SwitchProbe {
    pub fn online() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
        })
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(false),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivityProbe for SwitchProbe {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// ============================================================================
// XOR KEYSTREAM CIPHER
// ============================================================================

/// Symmetric XOR cipher over a SHA-256 counter keystream.
///
/// Not secure against anything; it exists so tests can verify that encrypted
/// entries are actually unreadable without the key and that key rotation
/// degrades reads to cache misses.
#[derive(Debug, Clone)]
pub struct XorKeystreamCipher {
    key: Vec<u8>,
}

impl XorKeystreamCipher {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    fn apply_keystream(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        for (block_index, block) in data.chunks(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(&self.key);
            hasher.update((block_index as u64).to_le_bytes());
            let keystream = hasher.finalize();
            for (byte, pad) in block.iter().zip(keystream.iter()) {
                out.push(byte ^ pad);
            }
        }
        out
    }
}

impl PayloadCipher for XorKeystreamCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Option<Vec<u8>> {
        Some(self.apply_keystream(plaintext))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        Some(self.apply_keystream(ciphertext))
    }
}

/// A cipher that refuses to operate, simulating a locked keystore.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCipher;

impl PayloadCipher for UnavailableCipher {
    fn encrypt(&self, _plaintext: &[u8]) -> Option<Vec<u8>> {
        None
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_entity_kind() -> impl Strategy<Value = EntityKind> {
        proptest::sample::select(EntityKind::all())
    }

    pub fn arb_cache_policy() -> impl Strategy<Value = CachePolicy> {
        prop_oneof![
            Just(CachePolicy::IgnoringCache),
            Just(CachePolicy::CacheElseLoad),
            Just(CachePolicy::CacheAndLoad),
            Just(CachePolicy::CacheDontLoad),
        ]
    }

    pub fn arb_change_kind() -> impl Strategy<Value = ChangeKind> {
        prop_oneof![
            Just(ChangeKind::Inserted),
            Just(ChangeKind::Updated),
            Just(ChangeKind::Deleted),
            Just(ChangeKind::ItemChanged),
            Just(ChangeKind::BatchCompleted),
        ]
    }

    pub fn arb_change_event() -> impl Strategy<Value = ChangeEvent> {
        (arb_entity_kind(), arb_record_id(), arb_change_kind()).prop_map(|(kind, id, change)| {
            match change {
                ChangeKind::Inserted => ChangeEvent::Inserted { kind, id },
                ChangeKind::Updated => ChangeEvent::Updated { kind, id },
                ChangeKind::Deleted => ChangeEvent::Deleted { kind, id },
                ChangeKind::ItemChanged => ChangeEvent::ItemChanged { kind },
                ChangeKind::BatchCompleted => ChangeEvent::BatchCompleted { kind },
            }
        })
    }

    pub fn arb_bookmark() -> impl Strategy<Value = Bookmark> {
        (arb_record_id(), "[a-z]{1,16}", any::<bool>()).prop_map(|(id, title, pinned)| Bookmark {
            url: format!("https://example.com/{title}"),
            id,
            title,
            pinned,
        })
    }

    pub fn arb_profile() -> impl Strategy<Value = Profile> {
        (arb_record_id(), "[a-z]{1,12}").prop_map(|(id, handle)| Profile {
            display_name: handle.to_uppercase(),
            id,
            handle,
        })
    }

    /// TTLs across the interesting boundary: non-positive means stored but
    /// already expired.
    pub fn arb_ttl_minutes() -> impl Strategy<Value = i64> {
        prop_oneof![Just(-10), Just(0), 1..=10_080i64]
    }
}
