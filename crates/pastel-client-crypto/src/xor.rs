use primitive_types::U256;
use sha3::{Digest, Sha3_256};

/// `SHA3-256(id1) XOR SHA3-256(id2)` interpreted as an unsigned 256-bit
/// integer (spec §4.2, Glossary "XOR distance").
pub fn xor_distance(id1: &str, id2: &str) -> U256 {
    let a = sha3_256_bytes(id1.as_bytes());
    let b = sha3_256_bytes(id2.as_bytes());
    let mut xored = [0u8; 32];
    for i in 0..32 {
        xored[i] = a[i] ^ b[i];
    }
    U256::from_big_endian(&xored)
}

fn sha3_256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(xor_distance("alice", "alice"), U256::zero());
    }

    #[test]
    fn distance_is_symmetric() {
        assert_eq!(xor_distance("alice", "bob"), xor_distance("bob", "alice"));
    }

    #[test]
    fn distance_is_deterministic() {
        assert_eq!(xor_distance("alice", "bob"), xor_distance("alice", "bob"));
    }
}
