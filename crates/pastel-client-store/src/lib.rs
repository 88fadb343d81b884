//! pastel-client-store
//!
//! Persistence façade (spec §4.8): typed record tables keyed by message
//! hash, insert-on-seen / lookup-by-hash operations, and a dedup helper
//! that folds repeated `(identity, request_hash)` rows down to the most
//! recent by block height. Also carries the `promo_pack_<identity>.json`
//! recovery file format (spec §6.4) that the distilled spec documents but
//! assigns no read/write operations to.

pub mod error;
pub mod promo_pack;
pub mod store;

pub use error::StoreError;
pub use promo_pack::PromoPack;
pub use store::{MemoryStore, Record, SledStore, Store};
