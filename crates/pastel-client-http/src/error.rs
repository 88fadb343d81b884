use thiserror::Error;

/// `PeerUnreachable` / `PeerRejection` at the transport boundary (spec
/// §7). Transport and timeout failures are retryable by the caller (the
/// engine moves on to the next peer); rejection/termination are terminal
/// for the current peer.
#[derive(Debug, Error)]
pub enum SupernodeError {
    #[error("transport error calling {endpoint} on {peer}: {source}")]
    Transport {
        peer: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timed out calling {endpoint} on {peer} after {timeout_secs}s")]
    Timeout { peer: String, endpoint: String, timeout_secs: u64 },

    #[error("{endpoint} on {peer} rejected the request: {reason}")]
    Rejected { peer: String, endpoint: String, reason: String },

    #[error("failed to decode response for {endpoint} on {peer}: {source}")]
    Decode {
        peer: String,
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("peer {peer} returned HTTP {status} for {endpoint}")]
    HttpStatus { peer: String, endpoint: String, status: u16 },

    #[error("failed to sign challenge for {peer}: {reason}")]
    Signing { peer: String, reason: String },
}

impl SupernodeError {
    /// True for failures the engine should treat as "try the next peer"
    /// rather than a terminal rejection.
    pub fn is_peer_unreachable(&self) -> bool {
        matches!(
            self,
            SupernodeError::Transport { .. }
                | SupernodeError::Timeout { .. }
                | SupernodeError::HttpStatus { .. }
        )
    }
}
