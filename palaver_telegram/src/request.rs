//! Request shapes accepted by the response pipeline.
//!
//! Attachment variants carry raw file identifiers only when the selected
//! model can consume them natively; otherwise the update handler has
//! already substituted extracted text and hands over a plain `Text`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChatRequest {
    Text {
        content: String,
        /// Route through the search collaborator before completion.
        search: bool,
    },
    Photo {
        file_id: String,
        content: String,
    },
    PhotoGroup {
        file_ids: Vec<String>,
        content: String,
    },
    Document {
        file_id: String,
        content: String,
    },
    Audio {
        file_id: String,
        content: String,
    },
}

impl ChatRequest {
    /// Text portion, used for history persistence and the cache estimate.
    pub(crate) fn content(&self) -> &str {
        match self {
            Self::Text { content, .. }
            | Self::Photo { content, .. }
            | Self::PhotoGroup { content, .. }
            | Self::Document { content, .. }
            | Self::Audio { content, .. } => content,
        }
    }
}
