//! pastel-client
//!
//! Library facade assembling the chain-RPC client, peer registry, cost
//! oracle, persistence store, and the credit-pack purchase, inference
//! request, and audit engines behind one [`Client`] handle (spec §2's
//! dependency order: crypto → envelope → RPC/peers → persistence →
//! purchase/inference engines → audit validator).
//!
//! Recovered credit-pack bundles (spec §6.4) are read and written through
//! [`pastel_client_store::PromoPack`] directly; this crate does not wrap it
//! further.

pub mod client;
pub mod error;

pub use client::{Client, InferenceRequestOutcome};
pub use error::ClientError;

pub use pastel_client_store::PromoPack;
