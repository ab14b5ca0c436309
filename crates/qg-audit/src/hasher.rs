// hasher.rs — SHA-256 helpers for the audit hash chain.
//
// Hashes are lowercase hex, 64 characters.

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes into a lowercase hex SHA-256 digest.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}
