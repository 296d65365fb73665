//! Error types for CACHET operations.
//!
//! Cache misses are not errors: absence and expiry are both represented as
//! `Option::None` at the store boundary. Failures with a safe local default
//! (a miss, a no-store) are absorbed where they occur and logged; failures
//! with no safe default always propagate.

use crate::enums::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Cache store errors.
///
/// `retrieve` never surfaces these for absence, expiry, or corrupt payloads;
/// they cover the substrate itself failing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to open cache environment at {path}: {reason}")]
    EnvOpen { path: String, reason: String },

    #[error("Cache transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Failed to serialize value for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Encryption unavailable for encrypted entry under key {key}")]
    CipherUnavailable { key: String },
}

/// Persistent-container errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    #[error("Record not found: {kind:?} with id {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Failed to open persistent container at {path}: {reason}")]
    ContainerOpen { path: String, reason: String },

    #[error("Commit failed: {reason}")]
    CommitFailed { reason: String },

    #[error("Fetch failed for {kind:?}: {reason}")]
    FetchFailed { kind: EntityKind, reason: String },

    #[error("Failed to serialize {kind:?} record {id}: {reason}")]
    Serialization {
        kind: EntityKind,
        id: Uuid,
        reason: String,
    },
}

/// Remote fetch errors, surfaced unchanged from the transport collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Remote fetch failed with status {status}: {message}")]
    Remote { status: i32, message: String },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Response decoding failed: {reason}")]
    Decode { reason: String },

    #[error("Remote fetch was cancelled")]
    Cancelled,
}

/// Errors surfaced on a request orchestration channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    /// `CacheDontLoad` (requested or downgraded-to) found nothing usable.
    #[error("Cache miss for key {key}")]
    CacheMiss { key: String },

    /// The remote fetch failed with no cache fallback available.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The cache substrate itself failed mid-request.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },
}

/// Top-level error wrapper for the workspace.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CachetError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias used throughout the workspace.
pub type CachetResult<T> = Result<T, CachetError>;

impl CachetError {
    /// Stable classification for the presentation layer.
    ///
    /// The UI maps these to localized "please try again" style messages
    /// without needing to understand internal causes.
    pub fn classification(&self) -> &'static str {
        match self {
            CachetError::Cache(_) => "cache",
            CachetError::Persist(_) => "persistence",
            CachetError::Fetch(_) => "network",
            CachetError::Request(RequestError::CacheMiss { .. }) => "not_found",
            CachetError::Request(RequestError::Fetch(_)) => "network",
            CachetError::Request(RequestError::Cache(_)) => "cache",
            CachetError::Config(_) => "configuration",
        }
    }
}
