use crate::canonicalize::{canonicalize, CanonicalizeError};
use pastel_client_core::Envelope;
use sha3::{Digest, Sha3_256};

/// SHA3-256 of `canonicalize(message)`, hex-encoded (spec §4.1
/// `hash_fields`).
pub fn hash_fields<T: Envelope>(message: &T) -> Result<String, CanonicalizeError> {
    let canonical = canonicalize(message)?;
    Ok(hash_bytes(canonical.as_bytes()))
}

/// SHA3-256 of raw bytes, hex-encoded. Used directly by the quorum
/// signing path, which signs a hash rather than a whole message.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_is_deterministic() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn hash_bytes_is_64_hex_chars() {
        assert_eq!(hash_bytes(b"hello").len(), 64);
    }
}
