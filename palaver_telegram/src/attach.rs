//! Attachment handling: capability gating, extraction fallbacks, and the
//! media-group accumulation window.
//!
//! Models that can consume an attachment natively get a typed request with
//! the raw file identifier; everything else is converted to text here
//! (OCR, document extraction, transcription) before the pipeline runs.

use crate::bot::Gateway;
use crate::handler;
use crate::pipeline;
use crate::request::ChatRequest;
use crate::types::Message;
use palaver_conversation::{PendingPhoto, UiTimer};
use palaver_core::find_model;
use palaver_files::parse_attachment;
use std::sync::Arc;
use std::time::Duration;

/// Quiescence window before a buffered media group is flushed.
const MEDIA_GROUP_WINDOW: Duration = Duration::from_secs(5);

pub(crate) async fn photo_request(
    gateway: &Gateway,
    chat_id: i64,
    message: &Message,
) -> Option<ChatRequest> {
    gateway.store.set_search_mode(chat_id, false).await;
    let file_id = message.largest_photo()?.file_id.clone();
    let caption = trimmed_caption(message);
    let model_id = gateway.store.model_id(chat_id).await;
    if find_model(&model_id).is_some_and(|spec| spec.vision) {
        let content = if caption.is_empty() {
            "Please analyze this image".to_string()
        } else {
            caption
        };
        return Some(ChatRequest::Photo { file_id, content });
    }
    let file_name = format!("photo_{file_id}.jpg");
    let Some(extracted) = parse(gateway, &file_id, &file_name).await else {
        gateway
            .outbox
            .send(chat_id, "❌ Image parsing failed", false)
            .await;
        return None;
    };
    Some(ChatRequest::Text {
        content: photo_text(&caption, &extracted),
        search: false,
    })
}

pub(crate) async fn document_request(
    gateway: &Gateway,
    chat_id: i64,
    message: &Message,
) -> Option<ChatRequest> {
    gateway.store.set_search_mode(chat_id, false).await;
    let document = message.document.as_ref()?;
    let file_id = document.file_id.clone();
    let file_name = document
        .file_name
        .clone()
        .unwrap_or_else(|| "document".to_string());
    let caption = trimmed_caption(message);
    let model_id = gateway.store.model_id(chat_id).await;
    if find_model(&model_id).is_some_and(|spec| spec.document) {
        let content = if caption.is_empty() {
            "Please analyze this document".to_string()
        } else {
            caption
        };
        return Some(ChatRequest::Document { file_id, content });
    }
    let Some(extracted) = parse(gateway, &file_id, &file_name).await else {
        gateway
            .outbox
            .send(chat_id, "❌ File parsing failed or unsupported file type", false)
            .await;
        return None;
    };
    Some(ChatRequest::Text {
        content: document_text(&caption, &file_name, &extracted),
        search: false,
    })
}

pub(crate) async fn voice_request(
    gateway: &Gateway,
    chat_id: i64,
    message: &Message,
) -> Option<ChatRequest> {
    gateway.store.set_search_mode(chat_id, false).await;
    let voice = message.voice.as_ref()?;
    let file_id = voice.file_id.clone();
    let caption = trimmed_caption(message);
    let model_id = gateway.store.model_id(chat_id).await;
    if find_model(&model_id).is_some_and(|spec| spec.audio) {
        return Some(ChatRequest::Audio {
            file_id,
            content: caption,
        });
    }
    let file_name = format!("voice_{file_id}.ogg");
    let Some(extracted) = parse(gateway, &file_id, &file_name).await else {
        gateway
            .outbox
            .send(chat_id, "❌ Voice parsing failed or unsupported model", false)
            .await;
        return None;
    };
    Some(ChatRequest::Text {
        content: voice_text(&caption, &extracted),
        search: false,
    })
}

pub(crate) async fn audio_request(
    gateway: &Gateway,
    chat_id: i64,
    message: &Message,
) -> Option<ChatRequest> {
    gateway.store.set_search_mode(chat_id, false).await;
    let audio = message.audio.as_ref()?;
    let file_id = audio.file_id.clone();
    let file_name = audio.file_name.clone().unwrap_or_else(|| "audio".to_string());
    let caption = trimmed_caption(message);
    let model_id = gateway.store.model_id(chat_id).await;
    if find_model(&model_id).is_some_and(|spec| spec.audio) {
        return Some(ChatRequest::Audio {
            file_id,
            content: caption,
        });
    }
    let Some(extracted) = parse(gateway, &file_id, &file_name).await else {
        gateway
            .outbox
            .send(chat_id, "❌ Audio parsing failed or unsupported model", false)
            .await;
        return None;
    };
    Some(ChatRequest::Text {
        content: audio_text(&caption, &file_name, &extracted),
        search: false,
    })
}

/// Buffers one album photo. The first photo of a group opens the batch
/// and arms the flush timer; replacement timers abort superseded ones.
pub(crate) async fn buffer_grouped_photo(
    gateway: &Arc<Gateway>,
    chat_id: i64,
    group_id: &str,
    message: &Message,
) {
    let Some(size) = message.largest_photo() else {
        return;
    };
    let pending = PendingPhoto {
        file_id: size.file_id.clone(),
        caption: message.caption.clone(),
    };
    let opened = gateway
        .store
        .buffer_grouped_photo(group_id, chat_id, pending)
        .await;
    if opened {
        let flush_gateway = Arc::clone(gateway);
        let flush_group = group_id.to_string();
        let timer = UiTimer::new(tokio::spawn(async move {
            tokio::time::sleep(MEDIA_GROUP_WINDOW).await;
            flush_media_group(&flush_gateway, &flush_group).await;
        }));
        gateway.store.arm_media_group_flush(group_id, timer).await;
    }
}

/// Drains a quiesced media group and runs it through the pipeline as one
/// request. Exactly-once: the take disarms the timer and removes the batch.
async fn flush_media_group(gateway: &Arc<Gateway>, group_id: &str) {
    let Some((chat_id, photos)) = gateway.store.take_media_group(group_id).await else {
        return;
    };
    gateway.store.set_search_mode(chat_id, false).await;
    let model_id = gateway.store.model_id(chat_id).await;
    let vision = find_model(&model_id).is_some_and(|spec| spec.vision);
    let caption = first_caption(&photos);

    let request = if vision {
        let file_ids: Vec<String> = photos.iter().map(|photo| photo.file_id.clone()).collect();
        let content = if caption.is_empty() {
            "Please analyze these images".to_string()
        } else {
            caption
        };
        ChatRequest::PhotoGroup { file_ids, content }
    } else {
        let mut contents = Vec::new();
        for photo in &photos {
            let file_name = format!("photo_{}.jpg", photo.file_id);
            if let Some(extracted) = parse(gateway, &photo.file_id, &file_name).await {
                contents.push(extracted);
            }
        }
        if contents.is_empty() {
            gateway
                .outbox
                .send(chat_id, "❌ All image parsing failed", false)
                .await;
            return;
        }
        ChatRequest::Text {
            content: photo_group_text(&caption, &contents),
            search: false,
        }
    };
    let user_content = request.content().to_string();
    let reply = pipeline::respond(gateway, chat_id, request).await;
    handler::deliver(gateway, chat_id, &user_content, reply).await;
}

async fn parse(gateway: &Gateway, file_id: &str, file_name: &str) -> Option<String> {
    parse_attachment(
        &gateway.files,
        gateway.providers.grok(),
        &gateway.transcriber,
        file_id,
        file_name,
    )
    .await
}

fn trimmed_caption(message: &Message) -> String {
    message
        .caption
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// First non-blank caption in arrival order labels the whole album.
fn first_caption(photos: &[PendingPhoto]) -> String {
    photos
        .iter()
        .filter_map(|photo| photo.caption.as_deref())
        .map(str::trim)
        .find(|caption| !caption.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn photo_text(caption: &str, content: &str) -> String {
    let header = "📸 <b>Image Content</b>:<br><br>";
    if caption.is_empty() {
        format!("{header}Please analyze this image:<br>{content}")
    } else {
        format!("{caption}<br><br>{header}{content}")
    }
}

fn photo_group_text(caption: &str, contents: &[String]) -> String {
    let header = "📸 <b>Image Contents</b>:<br><br>";
    let combined = contents
        .iter()
        .enumerate()
        .map(|(i, content)| format!("Image {}:<br>{content}", i + 1))
        .collect::<Vec<_>>()
        .join("<br><br>");
    if caption.is_empty() {
        format!("{header}Please analyze these images:<br>{combined}")
    } else {
        format!("{caption}<br><br>{header}{combined}")
    }
}

fn document_text(caption: &str, file_name: &str, content: &str) -> String {
    let header = format!("📄 <b>Filename</b>: <code>{file_name}</code><br><br>");
    if caption.is_empty() {
        format!("{header}Please analyze this file:<br>{content}")
    } else {
        format!("{caption}<br><br>{header}File content:<br>{content}")
    }
}

fn voice_text(caption: &str, content: &str) -> String {
    let header = "🎙️ <b>Voice Content</b>:<br><br>";
    if caption.is_empty() {
        format!("{header}Please analyze this voice:<br>{content}")
    } else {
        format!("{caption}<br><br>{header}{content}")
    }
}

fn audio_text(caption: &str, file_name: &str, content: &str) -> String {
    let header = format!("🎵 <b>Audio Filename</b>: <code>{file_name}</code><br><br>");
    if caption.is_empty() {
        format!("{header}Please analyze this audio:<br>{content}")
    } else {
        format!("{caption}<br><br>{header}Audio content:<br>{content}")
    }
}
