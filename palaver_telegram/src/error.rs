//! Error types for the Telegram gateway.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The Bot API answered with `ok: false` or a non-success status.
    #[error("Telegram API rejected {method}: {description}")]
    Api {
        method: &'static str,
        description: String,
    },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when Telegram refused the HTML entities in a message payload,
    /// which means the text must be re-sent without a parse mode.
    pub(crate) fn is_entity_parse_failure(&self) -> bool {
        matches!(self, Self::Api { description, .. } if description.contains("can't parse entities"))
    }
}
