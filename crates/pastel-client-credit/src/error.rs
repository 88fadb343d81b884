use pastel_client_core::ProtocolError;
use thiserror::Error;

/// Local error domain for the credit-pack purchase engine, converted into
/// the shared [`ProtocolError`] at the boundary with the host (spec §7).
#[derive(Debug, Error)]
pub enum CreditPackError {
    #[error("no active peers available to select a responder from")]
    NoPeersAvailable,

    #[error("envelope validation failed: {0:?}")]
    Validation(Vec<pastel_client_crypto::Violation>),

    #[error("peer unreachable: {peer}: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("the responder rejected or terminated the purchase: {reason}")]
    Rejected { reason: String },

    #[error("the quoted price was declined: {reason}")]
    Declined { reason: String },

    #[error("quorum verification failed: {0}")]
    ConsensusFailure(String),

    #[error("chain RPC error: {0}")]
    ChainRpc(String),

    #[error("every peer failed to report a completed purchase, and storage retry failed: {0}")]
    StorageRetryFailed(String),

    #[error("{0}")]
    ProtocolViolation(String),
}

impl From<CreditPackError> for ProtocolError {
    fn from(e: CreditPackError) -> Self {
        match e {
            CreditPackError::NoPeersAvailable => ProtocolError::PeerUnreachable {
                peer: "<none>".to_string(),
                reason: "no active peers available".to_string(),
            },
            CreditPackError::Validation(violations) => {
                ProtocolError::Validation(format!("{violations:?}"))
            }
            CreditPackError::PeerUnreachable { peer, reason } => {
                ProtocolError::PeerUnreachable { peer, reason }
            }
            CreditPackError::Rejected { reason } => ProtocolError::PeerRejection { reason },
            CreditPackError::Declined { reason } => ProtocolError::PeerRejection { reason },
            CreditPackError::ConsensusFailure(reason) => ProtocolError::ConsensusFailure(reason),
            CreditPackError::ChainRpc(reason) => ProtocolError::ChainRpc(reason),
            CreditPackError::StorageRetryFailed(reason) => ProtocolError::ConsensusFailure(reason),
            CreditPackError::ProtocolViolation(reason) => ProtocolError::ProtocolViolation(reason),
        }
    }
}
