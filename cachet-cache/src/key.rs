//! Composed cache keys.
//!
//! A key is a logical name plus a one-way hash of each parameter's string
//! representation, joined by a fixed separator. Identical inputs always
//! produce identical keys; differing parameter lists produce different keys
//! with overwhelming probability (full SHA-256 per parameter).

use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between the name and each hashed parameter.
const SEPARATOR: char = '/';

/// A deterministic, namespaced cache key.
///
/// Uniqueness is guaranteed by construction, not enforced externally:
/// two `compose` calls with the same name and parameters collide on
/// purpose, which is what makes write-through overwrite prior results
/// for the same logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    composed: String,
}

impl CacheKey {
    /// Compose a key from a logical name and an ordered parameter list.
    ///
    /// Parameter order matters: `["a", "b"]` and `["b", "a"]` yield
    /// different keys.
    pub fn compose(name: &str, params: &[&dyn fmt::Display]) -> Self {
        let mut composed = String::from(name);
        for param in params {
            let digest = Sha256::digest(param.to_string().as_bytes());
            composed.push(SEPARATOR);
            composed.push_str(&hex::encode(digest));
        }
        Self { composed }
    }

    /// A key with no parameters, for singleton values.
    pub fn simple(name: &str) -> Self {
        Self::compose(name, &[])
    }

    /// The composed key string.
    pub fn as_str(&self) -> &str {
        &self.composed
    }

    /// Whether this key falls under the given logical-name prefix.
    ///
    /// Used by bulk-clear sweeps keyed by namespace prefix.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.composed.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composed)
    }
}
