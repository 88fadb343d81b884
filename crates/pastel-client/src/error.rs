use pastel_client_audit::AuditError;
use pastel_client_core::ProtocolError;
use pastel_client_credit::CreditPackError;
use pastel_client_inference::InferenceError;
use thiserror::Error;

/// Top-level error returned to the host (spec §7): every engine's local
/// error domain converts into this one so nothing escapes `Client`
/// unshaped.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    CreditPack(#[from] CreditPackError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("peer registry error: {0}")]
    PeerRegistry(String),

    #[error("chain RPC error: {0}")]
    ChainRpc(String),

    #[error("persistence error: {0}")]
    Store(String),

    /// The top-level operation exceeded `T_op` (spec §5: "exceeding it
    /// cancels outstanding peer calls and returns a partial-failure
    /// result").
    #[error("operation exceeded its {0:?} deadline")]
    OperationTimedOut(std::time::Duration),
}

impl From<ClientError> for ProtocolError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::CreditPack(e) => e.into(),
            ClientError::Inference(e) => e.into(),
            ClientError::Audit(e) => e.into(),
            ClientError::PeerRegistry(reason) => ProtocolError::ChainRpc(reason),
            ClientError::ChainRpc(reason) => ProtocolError::ChainRpc(reason),
            ClientError::Store(reason) => ProtocolError::ProtocolViolation(reason),
            ClientError::OperationTimedOut(deadline) => {
                ProtocolError::ChainRpc(format!("operation exceeded its {deadline:?} deadline"))
            }
        }
    }
}
