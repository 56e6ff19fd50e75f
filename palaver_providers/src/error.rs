use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the provider adapters. `Rejected` keeps the
/// upstream status so the pipeline can pick the retry-hint reply over the
/// generic one.
#[derive(Debug, Error)]
pub enum Error {
    #[error("completion request rejected ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("malformed provider response: missing {0}")]
    Malformed(&'static str),
}
