//! pastel-client-http
//!
//! Typed HTTP façade onto one supernode's protocol endpoints (spec §6.2).
//! Every request body is wrapped in the challenge/response envelope
//! (`{<payload>, challenge, challenge_id, challenge_signature}`); this
//! crate fetches a fresh challenge once per `SupernodeClient` and re-signs
//! it on every call, as spec §6.2 requires.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::SupernodeClient;
pub use error::SupernodeError;
