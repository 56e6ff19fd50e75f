//! Gemini adapter via Google's OpenAI-compatible endpoint.

use crate::compat::CompatClient;
use crate::turns::system_led_turns;
use async_trait::async_trait;
use palaver_core::{ChatBackend, ChatMessage, CompletionReply, GenerationParams, ProviderFamily};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

pub struct GeminiBackend {
    client: CompatClient,
    params: GenerationParams,
}

impl GeminiBackend {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: CompatClient::new(api_key, BASE_URL),
            params: GenerationParams::default(),
        }
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Gemini
    }

    fn build_turns(
        &self,
        system_prompt: &str,
        window: &[ChatMessage],
        incoming: Option<ChatMessage>,
    ) -> Vec<ChatMessage> {
        system_led_turns(system_prompt, window, incoming)
    }

    async fn complete(
        &self,
        model: &str,
        turns: Vec<ChatMessage>,
        _cache_hint: bool,
    ) -> anyhow::Result<CompletionReply> {
        Ok(self.client.complete(model, &turns, self.params).await?)
    }
}
