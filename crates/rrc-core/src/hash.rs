//! SHA-256 hashing helpers.
//!
//! Provides the one-shot digest used for destination addressing and for
//! verifying bulk-transfer payloads, plus Reticulum's truncated hash.

use sha2::{Digest, Sha256};

use crate::types::TRUNCATED_HASH_LEN;

/// Compute the SHA-256 hash of the given data.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 truncated to its first 16 bytes (128 bits).
#[must_use]
pub fn truncated_hash(data: &[u8]) -> [u8; TRUNCATED_HASH_LEN] {
    let full = sha256(data);
    let mut result = [0u8; TRUNCATED_HASH_LEN];
    result.copy_from_slice(&full[..TRUNCATED_HASH_LEN]);
    result
}
