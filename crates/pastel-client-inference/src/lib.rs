//! pastel-client-inference
//!
//! Inference-request lifecycle (spec §4.4): model-menu discovery across the
//! active peer set, the usage-request/burn/confirm/poll/decode pipeline,
//! and the decoded output shape each `inference_type` produces.

pub mod discover;
pub mod engine;
pub mod error;
pub mod result;

pub use discover::{discover, DiscoveredPeer};
pub use engine::InferenceEngine;
pub use error::InferenceError;
pub use result::{InferenceOutcome, InferenceOutput};
