//! pastel-client-audit
//!
//! Quorum audit validator (spec §4.5): re-query the inference response
//! and result from peers other than the original responder, and compare
//! the responder's claimed fields against the majority value reported by
//! those auditors.

pub mod error;
pub mod fields;
pub mod validator;

pub use error::AuditError;
pub use validator::{AuditOutcome, AuditValidator, AUDITOR_COUNT, AUDIT_PHASE_GAP};
