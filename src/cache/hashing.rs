//! Key hashing for backends that cannot use raw keys as addresses.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the key; safe as a file name.
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Stable 64-bit hash of the key, identical in every process.
pub fn slot_hash(key: &[u8]) -> u64 {
    let digest = Sha256::digest(key);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_digest_is_fixed_length_hex() {
        let digest = key_digest("some/../odd key:*?");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, key_digest("some/../odd key:*?"));
        assert_ne!(digest, key_digest("another"));
    }

    #[test]
    fn test_slot_hash_is_stable() {
        assert_eq!(slot_hash(b"cache_a"), slot_hash(b"cache_a"));
        assert_ne!(slot_hash(b"cache_a"), slot_hash(b"cache_b"));
    }
}
