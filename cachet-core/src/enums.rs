//! Closed enumerations shared across the workspace.

use serde::{Deserialize, Serialize};

/// Entity kind discriminator for cached and persisted records.
///
/// This is a closed enum rather than a free-form type-name string, so
/// change-event filtering gets compile-time exhaustiveness checking.
/// `as_str()` exists only for logging and wire-level filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Bookmark,
    Profile,
    Document,
    Conversation,
    Notification,
    Setting,
}

impl EntityKind {
    /// Stable string discriminator, used for logging and subscriber filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bookmark => "Bookmark",
            EntityKind::Profile => "Profile",
            EntityKind::Document => "Document",
            EntityKind::Conversation => "Conversation",
            EntityKind::Notification => "Notification",
            EntityKind::Setting => "Setting",
        }
    }

    /// Single-byte storage discriminant for composed binary keys.
    pub fn as_byte(&self) -> u8 {
        match self {
            EntityKind::Bookmark => 0,
            EntityKind::Profile => 1,
            EntityKind::Document => 2,
            EntityKind::Conversation => 3,
            EntityKind::Notification => 4,
            EntityKind::Setting => 5,
        }
    }

    /// Decode a storage discriminant back to an EntityKind.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(EntityKind::Bookmark),
            1 => Some(EntityKind::Profile),
            2 => Some(EntityKind::Document),
            3 => Some(EntityKind::Conversation),
            4 => Some(EntityKind::Notification),
            5 => Some(EntityKind::Setting),
            _ => None,
        }
    }

    /// All known kinds, in discriminant order.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Bookmark,
            EntityKind::Profile,
            EntityKind::Document,
            EntityKind::Conversation,
            EntityKind::Notification,
            EntityKind::Setting,
        ]
    }
}

/// Strategy selecting the mix of local-cache and remote-fetch behavior
/// for a single logical request.
///
/// The variants form a total order of "network necessity": `IgnoringCache`
/// always hits the network, `CacheDontLoad` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Always refetch; writes the fresh result through to the cache.
    IgnoringCache,
    /// Return an unexpired cache hit if present, otherwise fetch remotely.
    CacheElseLoad,
    /// Emit a cache hit immediately if present, then emit the fresh network
    /// result when it arrives. At most two emissions.
    CacheAndLoad,
    /// Cache only. A miss is an explicit failure; the network is never touched.
    CacheDontLoad,
}

impl CachePolicy {
    /// Whether this policy may invoke the remote fetch.
    pub fn needs_remote(&self) -> bool {
        !matches!(self, CachePolicy::CacheDontLoad)
    }

    /// Whether this policy consults the cache before (or instead of) the network.
    pub fn reads_cache(&self) -> bool {
        !matches!(self, CachePolicy::IgnoringCache)
    }

    /// Resolve the policy actually evaluated, given observed connectivity.
    ///
    /// When no connectivity is observable, every policy downgrades to
    /// `CacheDontLoad`. This is a safety fallback, not a caller-visible option.
    pub fn effective(&self, online: bool) -> CachePolicy {
        if online {
            *self
        } else {
            CachePolicy::CacheDontLoad
        }
    }
}

/// Whether a cached payload is stored as-is or must be decrypted before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadEncoding {
    /// Serialized bytes stored verbatim.
    Plain,
    /// Serialized bytes passed through the injected symmetric cipher.
    Encrypted,
}

/// Change-event variant discriminator, used by subscriber allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    ItemChanged,
    BatchCompleted,
}
