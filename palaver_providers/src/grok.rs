//! Grok (x.ai) adapter: OpenAI-compatible completions plus the image
//! generation endpoint.

use crate::compat::CompatClient;
use crate::turns::system_led_turns;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use palaver_core::{ChatBackend, ChatMessage, CompletionReply, GenerationParams, ProviderFamily};
use serde_json::{Value, json};
use tracing::{debug, error};

const BASE_URL: &str = "https://api.x.ai/v1";

pub struct GrokBackend {
    client: CompatClient,
    params: GenerationParams,
}

/// One generated image, decoded and ready for multipart upload.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub revised_prompt: String,
}

impl GrokBackend {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: CompatClient::new(api_key, BASE_URL),
            params: GenerationParams::default(),
        }
    }

    /// Generate `n` images for the prompt. Any request failure comes back
    /// as an empty list; a per-image decode problem drops that image.
    pub async fn generate_images(&self, model: &str, prompt: &str, n: u32) -> Vec<GeneratedImage> {
        debug!("Generating images: model={model}, n={n}, prompt={prompt}");
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "n": n,
            "response_format": "b64_json",
        });
        let response = match self.client.post_json("images/generations", &payload).await {
            Ok(response) => response,
            Err(e) => {
                error!("Image generation failed: {e}");
                return Vec::new();
            }
        };
        parse_images(&response, prompt)
    }
}

fn parse_images(response: &Value, prompt: &str) -> Vec<GeneratedImage> {
    let Some(entries) = response["data"].as_array() else {
        return Vec::new();
    };
    let mut images = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let Some(encoded) = entry["b64_json"].as_str() else {
            continue;
        };
        match decode_b64_image(encoded) {
            Ok(bytes) => {
                let revised_prompt = entry["revised_prompt"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .unwrap_or(prompt)
                    .to_string();
                images.push(GeneratedImage {
                    bytes,
                    revised_prompt,
                });
            }
            Err(e) => error!("Image {} decode failed: {e}", index + 1),
        }
    }
    debug!("Generated {} images", images.len());
    images
}

/// Some responses prefix the payload as a data URL; only the part after
/// the comma is base64.
fn decode_b64_image(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let encoded = if encoded.starts_with("data:image") {
        encoded.split_once(',').map_or(encoded, |(_, data)| data)
    } else {
        encoded
    };
    STANDARD.decode(encoded)
}

#[async_trait]
impl ChatBackend for GrokBackend {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Grok
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
