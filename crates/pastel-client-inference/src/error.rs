use pastel_client_core::ProtocolError;
use thiserror::Error;

/// Local error domain for the inference-request engine, converted into the
/// shared [`ProtocolError`] at the boundary with the host (spec §7).
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no active peers available")]
    NoPeersAvailable,

    #[error("no peer advertises a model matching the requested name, inference type, and parameters")]
    NoMatchingModel,

    #[error("envelope validation failed: {0:?}")]
    Validation(Vec<pastel_client_crypto::Violation>),

    #[error("peer unreachable: {peer}: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("the responder rejected or terminated the request: {reason}")]
    Rejected { reason: String },

    #[error("proposed cost {proposed} credits exceeds the caller's maximum of {max} credits")]
    CostExceedsMaximum { proposed: f64, max: f64 },

    #[error("insufficient tracking-address balance: need {need} PSL, have {have} PSL")]
    InsufficientFunds { need: f64, have: f64 },

    #[error("confirmation transaction id {0:?} is not a well-formed 64-character hex txid")]
    MalformedTxid(String),

    #[error("chain RPC error: {0}")]
    ChainRpc(String),

    #[error("result was not ready after the maximum number of polling attempts")]
    ResultNotReady,

    #[error("{0}")]
    ProtocolViolation(String),
}

impl From<InferenceError> for ProtocolError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::NoPeersAvailable => ProtocolError::PeerUnreachable {
                peer: "<none>".to_string(),
                reason: "no active peers available".to_string(),
            },
            InferenceError::NoMatchingModel => {
                ProtocolError::ProtocolViolation("no peer advertises the requested model".to_string())
            }
            InferenceError::Validation(violations) => ProtocolError::Validation(format!("{violations:?}")),
            InferenceError::PeerUnreachable { peer, reason } => ProtocolError::PeerUnreachable { peer, reason },
            InferenceError::Rejected { reason } => ProtocolError::PeerRejection { reason },
            InferenceError::CostExceedsMaximum { proposed, max } => ProtocolError::PeerRejection {
                reason: format!("proposed cost {proposed} exceeds maximum {max}"),
            },
            InferenceError::InsufficientFunds { need, have } => ProtocolError::InsufficientFunds { need, have },
            InferenceError::MalformedTxid(txid) => {
                ProtocolError::ProtocolViolation(format!("malformed txid: {txid}"))
            }
            InferenceError::ChainRpc(reason) => ProtocolError::ChainRpc(reason),
            InferenceError::ResultNotReady => {
                ProtocolError::Timeout(std::time::Duration::from_secs(0))
            }
            InferenceError::ProtocolViolation(reason) => ProtocolError::ProtocolViolation(reason),
        }
    }
}
