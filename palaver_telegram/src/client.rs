//! Thin typed client for the Telegram Bot API.
//!
//! Every method POSTs to `{api_base}/bot{token}/{method}` and unwraps the
//! standard `{ok, result, description}` envelope. Retry and fallback policy
//! lives in the outbox, not here.

use crate::error::{Error, Result};
use palaver_providers::GeneratedImage;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tracing::info;

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl TelegramClient {
    #[must_use]
    pub fn new(token: &str, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    pub(crate) async fn call(&self, method: &'static str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        parse_envelope(method, status, &body)
    }

    pub(crate) async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.call(
            "deleteMessage",
            &json!({ "chat_id": chat_id, "message_id": message_id }),
        )
        .await
        .map(|_| ())
    }

    pub(crate) async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: &Value,
    ) -> Result<()> {
        self.call(
            "editMessageText",
            &json!({
                "chat_id": chat_id,
                "message_id": message_id,
                "text": text,
                "parse_mode": "HTML",
                "reply_markup": reply_markup,
            }),
        )
        .await
        .map(|_| ())
    }

    pub(crate) async fn answer_callback(&self, callback_id: &str) -> Result<()> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": callback_id, "text": "Received" }),
        )
        .await
        .map(|_| ())
    }

    pub(crate) async fn set_webhook(&self, url: &str) -> Result<()> {
        self.call("setWebhook", &json!({ "url": url })).await.map(|_| ())
    }

    /// Uploads generated images as one album. The caption rides on the first
    /// item only; Telegram shows it under the whole group.
    pub(crate) async fn send_media_group(
        &self,
        chat_id: i64,
        images: Vec<GeneratedImage>,
        caption: &str,
    ) -> Result<()> {
        let media = media_group_payload(images.len(), caption);
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("media", serde_json::to_string(&media)?);
        let count = images.len();
        for (i, image) in images.into_iter().enumerate() {
            let part = Part::bytes(image.bytes)
                .file_name(attachment_name(i))
                .mime_str("image/png")?;
            form = form.part(attachment_name(i), part);
        }
        let response = self
            .http
            .post(self.endpoint("sendMediaGroup"))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        parse_envelope("sendMediaGroup", status, &body)?;
        info!("Media group sent successfully with {count} images");
        Ok(())
    }
}

fn parse_envelope(method: &'static str, status: StatusCode, body: &str) -> Result<Value> {
    let mut envelope: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    if status.is_success() && envelope["ok"].as_bool() == Some(true) {
        return Ok(envelope["result"].take());
    }
    let description = envelope["description"]
        .as_str()
        .map_or_else(|| body.to_string(), ToString::to_string);
    Err(Error::Api {
        method,
        description,
    })
}

fn attachment_name(index: usize) -> String {
    format!("image_{index}.png")
}

fn media_group_payload(count: usize, caption: &str) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "type": "photo",
                "media": format!("attach://{}", attachment_name(i)),
                "caption": if i == 0 { caption } else { "" },
                "parse_mode": "HTML",
            })
        })
        .collect();
    Value::Array(items)
}
