use pastel_client_core::ProtocolError;
use thiserror::Error;

/// Local error domain for the audit validator (spec §4.5 / §7).
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("no auditor peers available (need at least one, excluding the responder)")]
    NoAuditorsAvailable,

    #[error("chain RPC error: {0}")]
    ChainRpc(String),

    #[error("peer registry error: {0}")]
    PeerRegistry(String),
}

impl From<AuditError> for ProtocolError {
    fn from(e: AuditError) -> Self {
        match e {
            AuditError::NoAuditorsAvailable => ProtocolError::PeerUnreachable {
                peer: "<none>".to_string(),
                reason: "no auditor peers available".to_string(),
            },
            AuditError::ChainRpc(reason) => ProtocolError::ChainRpc(reason),
            AuditError::PeerRegistry(reason) => ProtocolError::ChainRpc(reason),
        }
    }
}
