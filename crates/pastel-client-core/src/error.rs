use thiserror::Error;

/// The error taxonomy shared across every engine, matching spec §7.
///
/// Engines catch [`ProtocolError::PeerUnreachable`] locally and move on to
/// the next peer; every other variant bubbles to the top-level operation.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("peer unreachable: {peer}: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("peer rejected the request: {reason}")]
    PeerRejection { reason: String },

    #[error("consensus failure: {0}")]
    ConsensusFailure(String),

    #[error("insufficient funds: need {need} PSL, have {have} PSL")]
    InsufficientFunds { need: f64, have: f64 },

    #[error("chain RPC error: {0}")]
    ChainRpc(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

impl ProtocolError {
    /// True for errors that justify trying the next peer rather than
    /// failing the whole operation.
    pub fn is_retryable_peer_error(&self) -> bool {
        matches!(self, ProtocolError::PeerUnreachable { .. })
    }
}
