use thiserror::Error;

/// `ChainRPCError` (spec §7): raised on `{error: {...}}` from the node, or
/// on a missing `result` field (a protocol violation — the node should
/// never send that).
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error calling {method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node returned an error for {method}: {message} (code {code})")]
    NodeError {
        method: String,
        code: i64,
        message: String,
    },

    #[error("node response for {method} had no `result` field")]
    MissingResult { method: String },

    #[error("failed to decode response for {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RpcError {
    /// True for errors that should be retried (transient transport
    /// failures), per spec §7's "Retry-once for transient errors,
    /// otherwise surfaced".
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Transport { .. })
    }
}
