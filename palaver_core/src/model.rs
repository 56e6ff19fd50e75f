//! Static model-capability table.
//!
//! Every selectable model maps to a provider family plus capability flags.
//! The handlers consult these flags to decide whether attachments are sent
//! as typed parts or substituted with extracted text first.

use serde::{Deserialize, Serialize};

/// Model switched to by default when a conversation first appears.
pub const DEFAULT_MODEL: &str = "grok-2-vision-latest";

/// The one model whose "completion" is image generation instead of text.
pub const IMAGE_MODEL: &str = "grok-2-image";

/// Closed set of upstream request conventions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    OpenRouter,
    DeepSeek,
    Grok,
    Gemini,
}

impl ProviderFamily {
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
            Self::Grok => "grok",
            Self::Gemini => "gemini",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "openrouter" => Some(Self::OpenRouter),
            "deepseek" => Some(Self::DeepSeek),
            "grok" => Some(Self::Grok),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Identifier sent to the provider and used as callback data.
    pub id: &'static str,
    /// Short name shown to the user after switching.
    pub display_name: &'static str,
    pub family: ProviderFamily,
    pub vision: bool,
    pub document: bool,
    pub audio: bool,
    /// Search is built into the model; queries are forwarded verbatim.
    pub search: bool,
}

pub static SUPPORTED_MODELS: &[ModelSpec] = &[
    ModelSpec {
        id: "anthropic/claude-3.7-sonnet:thinking",
        display_name: "claude-3.7-sonnet",
        family: ProviderFamily::OpenRouter,
        vision: true,
        document: true,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "perplexity/sonar-deep-research",
        display_name: "sonar-deep-research",
        family: ProviderFamily::OpenRouter,
        vision: false,
        document: false,
        audio: false,
        search: true,
    },
    ModelSpec {
        id: "meta-llama/llama-3.3-70b-instruct",
        display_name: "llama-3.3-70b",
        family: ProviderFamily::OpenRouter,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "openai/gpt-4o-mini",
        display_name: "gpt-4o-mini",
        family: ProviderFamily::OpenRouter,
        vision: true,
        document: true,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "mistralai/mistral-nemo",
        display_name: "mistral-nemo",
        family: ProviderFamily::OpenRouter,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "qwen/qwen2.5-vl-32b-instruct:free",
        display_name: "qwen2.5-vl-32b",
        family: ProviderFamily::OpenRouter,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "deepseek/deepseek-chat-v3-0324:free",
        display_name: "deepseek-v3(openrouter)",
        family: ProviderFamily::OpenRouter,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "deepseek/deepseek-r1:free",
        display_name: "deepseek-r1(openrouter)",
        family: ProviderFamily::OpenRouter,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "gemini-2.0-flash",
        display_name: "gemini-2.0-flash",
        family: ProviderFamily::Gemini,
        vision: true,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "grok-2-vision-latest",
        display_name: "grok-2",
        family: ProviderFamily::Grok,
        vision: true,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "grok-2-image",
        display_name: "grok-2-image",
        family: ProviderFamily::Grok,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "deepseek-reasoner",
        display_name: "DeepSeek-R1",
        family: ProviderFamily::DeepSeek,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
    ModelSpec {
        id: "deepseek-chat",
        display_name: "DeepSeek-V3",
        family: ProviderFamily::DeepSeek,
        vision: false,
        document: false,
        audio: false,
        search: false,
    },
];

#[must_use]
pub fn find_model(id: &str) -> Option<&'static ModelSpec> {
    SUPPORTED_MODELS.iter().find(|spec| spec.id == id)
}
