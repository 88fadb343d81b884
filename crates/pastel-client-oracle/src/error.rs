use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("price source unavailable: {0}")]
    Unavailable(String),

    #[error("price source returned a value outside the plausible range: {0}")]
    OutOfRange(f64),

    #[error("both price sources were unavailable")]
    AllSourcesUnavailable,

    #[error("failed to parse price source response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        OracleError::Unavailable(e.to_string())
    }
}
