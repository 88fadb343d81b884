use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("failed to (de)serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read/write promo pack file at {path}: {source}")]
    PromoPackIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
