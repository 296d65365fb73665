//! Symmetric encryption seam for cached payloads.
//!
//! The cipher is a consumed contract: the platform layer injects a concrete
//! implementation (hardware keystore, OS crypto, ...). Failure on either
//! direction is `None`, never an error - a corrupted or key-rotated payload
//! degrades to a cache miss.

/// Encrypt/decrypt contract for payload bytes at rest.
pub trait PayloadCipher: Send + Sync {
    /// Encrypt the payload. `None` means the payload cannot be protected
    /// and must not be stored.
    fn encrypt(&self, plaintext: &[u8]) -> Option<Vec<u8>>;

    /// Decrypt the payload. `None` degrades the read to a cache miss.
    fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>>;
}

/// Pass-through cipher for deployments that store everything plain.
///
/// Entries written through it still carry the `Plain` encoding tag, so a
/// later switch to a real cipher does not misread old payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCipher;

impl PayloadCipher for NoopCipher {
    fn encrypt(&self, plaintext: &[u8]) -> Option<Vec<u8>> {
        Some(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Option<Vec<u8>> {
        Some(ciphertext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_roundtrip() {
        let cipher = NoopCipher;
        let sealed = cipher.encrypt(b"hello").expect("encrypt");
        assert_eq!(cipher.decrypt(&sealed).expect("decrypt"), b"hello");
    }
}
