//! pastel-client-rpc
//!
//! A JSON-RPC 1.1 client to the Pastel chain node (spec §4.7/§6.1): HTTP
//! Basic auth, keep-alive, a global semaphore limiting concurrent calls,
//! and per-call retry with exponential backoff.

pub mod client;
pub mod error;
pub mod types;

pub use client::ChainRpcClient;
pub use error::RpcError;
