#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod model;
pub mod prompt;

pub use model::{DEFAULT_MODEL, IMAGE_MODEL, ModelSpec, ProviderFamily, SUPPORTED_MODELS, find_model};
pub use prompt::{PERSONAS, PersonaSpec, build_system_prompt, find_persona};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One part of a multimodal message, in the OpenAI-compatible wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    DocumentUrl { document_url: DocumentUrl },
    AudioUrl { audio_url: AudioUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
    pub detail: String,
}

impl ImageUrl {
    #[must_use]
    pub fn high(url: String) -> Self {
        Self {
            url,
            detail: "high".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioUrl {
    pub url: String,
}

/// Message content: plain text serializes as a JSON string, multimodal
/// content as an array of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    /// Character count of the textual portion, used for history budgeting.
    #[must_use]
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(text) => text.chars().count(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => text.chars().count(),
                    _ => 0,
                })
                .sum(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Uniform completion result across provider families. Reasoning and the
/// final answer travel as separate fields; only the answer is persisted.
#[derive(Debug, Clone, Default)]
pub struct CompletionReply {
    pub content: String,
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Sampling parameters shared by every provider family.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.6,
            top_p: 0.9,
            presence_penalty: 0.7,
            max_tokens: 8192,
        }
    }
}

/// One provider family adapter: arranges turns per the family's request
/// conventions, submits them, and returns the uniform reply shape.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Arrange the system prompt, trimmed history window, and the incoming
    /// turn into the ordered turn sequence this family expects.
    fn build_turns(
        &self,
        system_prompt: &str,
        window: &[ChatMessage],
        incoming: Option<ChatMessage>,
    ) -> Vec<ChatMessage>;

    /// Submit the turns and parse content, reasoning, and usage.
    async fn complete(
        &self,
        model: &str,
        turns: Vec<ChatMessage>,
        cache_hint: bool,
    ) -> anyhow::Result<CompletionReply>;
}

/// Rough token estimate: every non-ASCII character counts as one token,
/// ASCII text as one token per four characters, rounded up.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let non_ascii = text.chars().filter(|c| !c.is_ascii()).count();
    let ascii = text.chars().count() - non_ascii;
    non_ascii + ascii / 4 + usize::from(ascii % 4 != 0)
}
