//! The response pipeline: one chat request in, one reply out.
//!
//! Takes a snapshot of the conversation, routes the request through image
//! generation, search enrichment, or a plain completion, and maps every
//! failure to its user-facing sentinel. Network calls happen outside the
//! store lock; the snapshot is taken once up front.

use crate::bot::Gateway;
use crate::request::ChatRequest;
use palaver_core::{
    ChatMessage, ContentPart, IMAGE_MODEL, ImageUrl, MessageContent, ProviderFamily,
    build_system_prompt, find_model,
};
use palaver_files::ocr::image_data_url;
use palaver_markup::render::{
    PIPELINE_ERROR, REQUEST_FAILED, UNSUPPORTED_MODEL, is_error_reply, render_reply,
};
use palaver_markup::{escape, strip_tags};
use palaver_providers::{optimize_search_intent, wants_cache};
use tracing::error;

/// History turns included in each completion request.
const RECENT_WINDOW: usize = 6;
/// Search results fed into the analysis turn.
const SEARCH_RESULT_LIMIT: usize = 3;
/// Images generated per request.
const IMAGE_COUNT: u32 = 2;

/// Outcome of one pipeline run, telling the dispatcher what to send and
/// what to persist.
pub(crate) enum Reply {
    /// The album was already delivered; persist the caption turn pair.
    ImagesSent { caption: String },
    /// Successful completion: send `full`, persist `answer`.
    Text { full: String, answer: String },
    /// Failure notice: sent to the chat, never recorded in history.
    Failure { notice: String },
}

pub(crate) async fn respond(gateway: &Gateway, chat_id: i64, request: ChatRequest) -> Reply {
    let snapshot = gateway.store.prompt_snapshot(chat_id, RECENT_WINDOW).await;
    let Some(spec) = find_model(&snapshot.model_id) else {
        return Reply::Failure {
            notice: UNSUPPORTED_MODEL.to_string(),
        };
    };

    if spec.id == IMAGE_MODEL {
        if let ChatRequest::Text { content, .. } = &request {
            return generate_images(gateway, chat_id, content).await;
        }
    }

    let system_prompt = build_system_prompt(snapshot.persona.as_deref());
    let window: Vec<ChatMessage> = snapshot
        .recent
        .iter()
        .map(|turn| ChatMessage::new(turn.role, turn.content.clone()))
        .collect();
    let cache_hint = wants_cache(&system_prompt, &window, request.content());

    let incoming = match request {
        ChatRequest::Text {
            content,
            search: true,
        } => {
            if spec.search {
                ChatMessage::user(content)
            } else {
                let query = optimize_search_intent(gateway.providers.grok(), &content).await;
                let results = gateway.search.search(&query, SEARCH_RESULT_LIMIT).await;
                ChatMessage::user(search_analysis_turn(&results))
            }
        }
        ChatRequest::Text {
            content,
            search: false,
        } => ChatMessage::user(content),
        ChatRequest::Photo { file_id, content } => {
            gateway.store.set_search_mode(chat_id, false).await;
            match photo_parts(gateway, spec.family, &[file_id], false, &content).await {
                Ok(parts) => ChatMessage::user(MessageContent::Parts(parts)),
                Err(notice) => return Reply::Failure { notice },
            }
        }
        ChatRequest::PhotoGroup { file_ids, content } => {
            gateway.store.set_search_mode(chat_id, false).await;
            match photo_parts(gateway, spec.family, &file_ids, true, &content).await {
                Ok(parts) => ChatMessage::user(MessageContent::Parts(parts)),
                Err(notice) => return Reply::Failure { notice },
            }
        }
        ChatRequest::Document { file_id, content } => {
            gateway.store.set_search_mode(chat_id, false).await;
            match document_parts(gateway, file_id.as_str(), &content).await {
                Ok(parts) => ChatMessage::user(MessageContent::Parts(parts)),
                Err(notice) => return Reply::Failure { notice },
            }
        }
        ChatRequest::Audio { file_id, content } => {
            gateway.store.set_search_mode(chat_id, false).await;
            match audio_parts(gateway, file_id.as_str(), &content).await {
                Ok(parts) => ChatMessage::user(MessageContent::Parts(parts)),
                Err(notice) => return Reply::Failure { notice },
            }
        }
    };

    let Some(backend) = gateway.providers.backend_for(spec.id) else {
        return Reply::Failure {
            notice: UNSUPPORTED_MODEL.to_string(),
        };
    };
    let turns = backend.build_turns(&system_prompt, &window, Some(incoming));
    match backend.complete(spec.id, turns, cache_hint).await {
        Ok(completion) => {
            let rendered = render_reply(&completion);
            if is_error_reply(&rendered.full) {
                Reply::Failure {
                    notice: rendered.full,
                }
            } else {
                Reply::Text {
                    full: rendered.full,
                    answer: rendered.answer,
                }
            }
        }
        Err(e) => {
            error!("Completion request failed: {e:#}");
            Reply::Failure {
                notice: completion_failure(&e).to_string(),
            }
        }
    }
}

/// Image generation for the dedicated image model. The album is delivered
/// here; the dispatcher only records the caption afterwards.
async fn generate_images(gateway: &Gateway, chat_id: i64, content: &str) -> Reply {
    gateway.store.set_search_mode(chat_id, false).await;
    let prompt = content.trim();
    if prompt.is_empty() {
        return Reply::Failure {
            notice: "❌ Please provide image description".to_string(),
        };
    }
    let images = gateway
        .providers
        .grok()
        .generate_images(IMAGE_MODEL, prompt, IMAGE_COUNT)
        .await;
    if images.is_empty() {
        return Reply::Failure {
            notice: "❌ Image generation failed".to_string(),
        };
    }
    let (caption, block) = image_caption(&images[0].revised_prompt);
    match gateway.client.send_media_group(chat_id, images, &block).await {
        Ok(()) => Reply::ImagesSent { caption },
        Err(e) => {
            error!("Media group send failed: {e}");
            Reply::Failure {
                notice: "❌ Failed to send images".to_string(),
            }
        }
    }
}

/// Vision parts for one or more photos; the text description rides last.
/// Grok and Gemini need the bytes inlined as a data URL, the rest accept
/// the platform's file URL directly.
async fn photo_parts(
    gateway: &Gateway,
    family: ProviderFamily,
    file_ids: &[String],
    grouped: bool,
    content: &str,
) -> Result<Vec<ContentPart>, String> {
    let mut parts = Vec::with_capacity(file_ids.len() + 1);
    for file_id in file_ids {
        let Some(path) = gateway.files.resolve(file_id).await else {
            let notice = if grouped {
                "❌ Failed to get image path"
            } else {
                "❌ Failed to get file path"
            };
            return Err(notice.to_string());
        };
        let image_url = if matches!(family, ProviderFamily::Grok | ProviderFamily::Gemini) {
            let Some(file) = gateway.files.fetch(&path).await else {
                return Err("❌ Image download failed".to_string());
            };
            ImageUrl::high(image_data_url(&file.bytes, &file.content_type))
        } else {
            ImageUrl::high(gateway.files.file_url(&path))
        };
        parts.push(ContentPart::ImageUrl { image_url });
    }
    parts.push(ContentPart::Text {
        text: content.to_string(),
    });
    Ok(parts)
}

/// Document turn: the instruction text leads, the document reference follows.
async fn document_parts(
    gateway: &Gateway,
    file_id: &str,
    content: &str,
) -> Result<Vec<ContentPart>, String> {
    let Some(path) = gateway.files.resolve(file_id).await else {
        return Err("❌ Failed to get file path".to_string());
    };
    Ok(vec![
        ContentPart::Text {
            text: content.to_string(),
        },
        ContentPart::DocumentUrl {
            document_url: palaver_core::DocumentUrl {
                url: gateway.files.file_url(&path),
            },
        },
    ])
}

/// Audio turn for natively audio-capable models, mirroring the photo
/// layout with the text description last.
async fn audio_parts(
    gateway: &Gateway,
    file_id: &str,
    content: &str,
) -> Result<Vec<ContentPart>, String> {
    let Some(path) = gateway.files.resolve(file_id).await else {
        return Err("❌ Failed to get file path".to_string());
    };
    Ok(vec![
        ContentPart::AudioUrl {
            audio_url: palaver_core::AudioUrl {
                url: gateway.files.file_url(&path),
            },
        },
        ContentPart::Text {
            text: content.to_string(),
        },
    ])
}

fn search_analysis_turn(results: &str) -> String {
    format!("Please analyze these search results:\n{results}")
}

/// Clean caption for history plus the escaped expandable-quote block sent
/// with the album.
fn image_caption(revised: &str) -> (String, String) {
    let caption = strip_tags(revised);
    let block = format!("<blockquote expandable>{}</blockquote>", escape(&caption));
    (caption, block)
}

/// Maps a completion failure to its user-facing sentinel. An explicit
/// provider rejection reads as a request failure; everything else as a
/// timeout-or-error retry prompt.
fn completion_failure(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<palaver_providers::Error>() {
        Some(palaver_providers::Error::Rejected { .. }) => REQUEST_FAILED,
        _ => PIPELINE_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::{completion_failure, image_caption, search_analysis_turn};
    use palaver_markup::render::{PIPELINE_ERROR, REQUEST_FAILED};

    #[test]
    fn test_search_turn_wraps_results_in_analysis_request() {
        let turn = search_analysis_turn("1. Result A\n2. Result B");
        assert!(turn.contains("analyze"));
        assert!(turn.ends_with("1. Result A\n2. Result B"));
    }

    #[test]
    fn test_image_caption_strips_tags_and_escapes_block() {
        let (caption, block) = image_caption("a <b>majestic</b> cat & friend");
        assert_eq!(caption, "a majestic cat & friend");
        assert_eq!(
            block,
            "<blockquote expandable>a majestic cat &amp; friend</blockquote>"
        );
    }

    #[test]
    fn test_provider_rejection_maps_to_request_failed() {
        let rejection = anyhow::Error::new(palaver_providers::Error::Rejected {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "upstream".to_string(),
        });
        assert_eq!(completion_failure(&rejection), REQUEST_FAILED);
    }

    #[test]
    fn test_other_failures_map_to_pipeline_error() {
        let other = anyhow::anyhow!("connection reset");
        assert_eq!(completion_failure(&other), PIPELINE_ERROR);
    }
}
