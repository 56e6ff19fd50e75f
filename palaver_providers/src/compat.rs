//! OpenAI-compatible `chat/completions` transport.
//!
//! DeepSeek, Grok and Gemini expose the same request shape behind
//! different base URLs; only the turn arrangement differs per family.

use crate::{Error, Result};
use palaver_core::{ChatMessage, CompletionReply, GenerationParams, Usage};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub(crate) struct CompatClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl CompatClient {
    pub(crate) fn new(api_key: String, base_url: &str) -> Self {
        Self {
            http: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) async fn post_json(&self, path: &str, payload: &Value) -> Result<Value> {
        Ok(self
            .http
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?)
    }

    pub(crate) async fn complete(
        &self,
        model: &str,
        turns: &[ChatMessage],
        params: GenerationParams,
    ) -> Result<CompletionReply> {
        let payload = build_payload(model, turns, params)?;
        info!("Sending completion request: model={model}");
        let response = self.post_json("chat/completions", &payload).await?;
        debug!("Full completion response: {response}");
        info!("Completion response received: model={model}");
        parse_reply(&response)
    }
}

fn build_payload(model: &str, turns: &[ChatMessage], params: GenerationParams) -> Result<Value> {
    Ok(json!({
        "model": model,
        "messages": serde_json::to_value(turns)?,
        "stream": false,
        "temperature": params.temperature,
        "top_p": params.top_p,
        "presence_penalty": params.presence_penalty,
        "max_tokens": params.max_tokens,
    }))
}

/// Content is trimmed; reasoning comes from whichever field the model
/// populates.
fn parse_reply(response: &Value) -> Result<CompletionReply> {
    let message = &response["choices"][0]["message"];
    let content = message["content"]
        .as_str()
        .ok_or(Error::Malformed("choices[0].message.content"))?
        .trim()
        .to_string();
    let reasoning = message["reasoning"]
        .as_str()
        .or_else(|| message["reasoning_content"].as_str())
        .map(ToString::to_string);
    Ok(CompletionReply {
        content,
        reasoning,
        usage: parse_usage(&response["usage"]),
    })
}

/// Absent usage object maps to `None`; absent counters inside it to zero.
pub(crate) fn parse_usage(usage: &Value) -> Option<Usage> {
    if !usage.is_object() {
        return None;
    }
    let counter = |name: &str| u32::try_from(usage[name].as_u64().unwrap_or(0)).unwrap_or(0);
    Some(Usage {
        prompt_tokens: counter("prompt_tokens"),
        completion_tokens: counter("completion_tokens"),
        total_tokens: counter("total_tokens"),
    })
}
