//! OpenAI-compatible speech-to-text.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::error;

/// Client for an `audio/transcriptions` endpoint.
///
/// Voice notes and audio files sent to a model without native audio
/// support go through here first; the transcript then travels as plain
/// text.
pub struct TranscriptionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    language: Option<String>,
}

impl TranscriptionClient {
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        language: Option<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            language,
        }
    }

    /// Uploads the audio and returns the transcript.
    ///
    /// An empty transcript counts as a failure: silence gives the model
    /// nothing to work with.
    pub async fn transcribe(&self, file_name: &str, mime: &str, bytes: Vec<u8>) -> Option<String> {
        let mut part = Part::bytes(bytes).file_name(file_name.to_string());
        if !mime.is_empty() {
            part = match part.mime_str(mime) {
                Ok(part) => part,
                Err(e) => {
                    error!("Rejected audio mime type {mime}: {e}");
                    return None;
                }
            };
        }
        let mut form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Transcription request failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Transcription rejected ({status}): {body}");
            return None;
        }
        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                error!("Transcription response unreadable: {e}");
                return None;
            }
        };
        let text = data["text"].as_str().unwrap_or_default().trim().to_string();
        if text.is_empty() { None } else { Some(text) }
    }
}
