//! OpenRouter adapter: raw `chat/completions` with the `reasoning`
//! parameter and per-turn cache hints.

use crate::compat::parse_usage;
use crate::turns::system_led_turns;
use crate::{Error, Result};
use async_trait::async_trait;
use palaver_core::{ChatBackend, ChatMessage, CompletionReply, GenerationParams, ProviderFamily};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

const API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

pub struct OpenRouterBackend {
    http: Client,
    api_key: String,
    api_url: String,
    params: GenerationParams,
}

impl OpenRouterBackend {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            api_url: API_URL.to_string(),
            params: GenerationParams::default(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: String) -> Self {
        self.api_url = api_url;
        self
    }

    async fn try_send(&self, payload: &Value) -> Result<CompletionReply> {
        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Rejected { status, body });
        }
        let data = response.json::<Value>().await?;
        debug!("Full completion response: {data}");
        parse_reply(&data)
    }
}

/// The reasoning budget rides in a dedicated parameter; the o1 preview
/// models only accept the effort form.
fn reasoning_param(model: &str, max_tokens: u32) -> Value {
    if model.contains("o1-mini") || model.contains("o1-preview") {
        json!({"effort": "low"})
    } else {
        json!({"max_tokens": max_tokens})
    }
}

/// Request body. `max_tokens` never appears at the top level; the budget
/// travels inside `reasoning`.
fn build_payload(
    model: &str,
    turns: &[ChatMessage],
    params: GenerationParams,
    cache_hint: bool,
) -> Result<Value> {
    let mut messages = serde_json::to_value(turns)?;
    if cache_hint {
        if let Some(items) = messages.as_array_mut() {
            for turn in items {
                if let Some(turn) = turn.as_object_mut() {
                    turn.insert("cache_control".to_string(), json!({"type": "ephemeral"}));
                }
            }
        }
        debug!("Cache hint enabled: estimated tokens >= 1024");
    }
    Ok(json!({
        "model": model,
        "messages": messages,
        "temperature": params.temperature,
        "top_p": params.top_p,
        "presence_penalty": params.presence_penalty,
        "reasoning": reasoning_param(model, params.max_tokens),
    }))
}

/// Content is forwarded untrimmed; reasoning only ever arrives in the
/// `reasoning` field on this route.
fn parse_reply(response: &Value) -> Result<CompletionReply> {
    let message = &response["choices"][0]["message"];
    let content = message["content"]
        .as_str()
        .ok_or(Error::Malformed("choices[0].message.content"))?
        .to_string();
    let reasoning = message["reasoning"].as_str().map(ToString::to_string);
    Ok(CompletionReply {
        content,
        reasoning,
        usage: parse_usage(&response["usage"]),
    })
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::OpenRouter
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
        cache_hint: bool,
    ) -> anyhow::Result<CompletionReply> {
        let payload = build_payload(model, &turns, self.params, cache_hint)?;
        info!("Sending completion request: model={model}");
        let reply = self.try_send(&payload).await?;
        info!("Completion response received: model={model}");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(model: &str, cache_hint: bool) -> Value {
        let turns = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        match build_payload(model, &turns, GenerationParams::default(), cache_hint) {
            Ok(payload) => payload,
            Err(e) => panic!("payload build failed: {e}"),
        }
    }

    #[test]
    fn test_reasoning_budget_default() {
        let payload = payload("anthropic/claude-3.7-sonnet:thinking", false);
        assert_eq!(payload["reasoning"], json!({"max_tokens": 8192}));
        assert!(payload.get("max_tokens").is_none());
        assert!(payload.get("stream").is_none());
    }

    #[test]
    fn test_reasoning_effort_for_o1_models() {
        assert_eq!(
            payload("openai/o1-mini", false)["reasoning"],
            json!({"effort": "low"})
        );
        assert_eq!(
            payload("openai/o1-preview", false)["reasoning"],
            json!({"effort": "low"})
        );
    }

    #[test]
    fn test_cache_hint_marks_every_turn() {
        let payload = payload("openai/gpt-4o-mini", true);
        let Some(messages) = payload["messages"].as_array() else {
            panic!("messages array expected");
        };
        assert_eq!(messages.len(), 2);
        for turn in messages {
            assert_eq!(turn["cache_control"], json!({"type": "ephemeral"}));
        }
    }

    #[test]
    fn test_no_cache_hint_leaves_turns_bare() {
        let payload = payload("openai/gpt-4o-mini", false);
        assert!(payload["messages"][0].get("cache_control").is_none());
    }

    #[test]
    fn test_reply_keeps_content_verbatim() {
        let response = json!({
            "choices": [{"message": {"content": "body\n", "reasoning": "chain"}}],
        });
        let Ok(reply) = parse_reply(&response).map_err(|e| e.to_string()) else {
            panic!("parse failed");
        };
        assert_eq!(reply.content, "body\n");
        assert_eq!(reply.reasoning.as_deref(), Some("chain"));
        assert!(reply.usage.is_none());
    }
}
