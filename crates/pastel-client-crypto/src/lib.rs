//! pastel-client-crypto
//!
//! The message envelope: canonical serialization, SHA3-256 hashing,
//! sign/verify delegation, envelope validation, and XOR-distance peer
//! routing math. Canonicalization must match bit-for-bit across
//! heterogeneous peer implementations, so it is specified here rather
//! than left to each message's `Serialize` impl.

pub mod canonicalize;
pub mod hash;
pub mod signer;
pub mod validate;
pub mod xor;

pub use canonicalize::{canonicalize, CanonicalizeError};
pub use hash::{hash_bytes, hash_fields};
pub use signer::{Signer, Verifier};
pub use validate::{validate_local, verify_signature, Violation};
pub use xor::xor_distance;
