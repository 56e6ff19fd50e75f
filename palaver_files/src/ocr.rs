//! Image-to-text through a vision-capable completion call.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use palaver_core::{ChatBackend, ChatMessage, ContentPart, DEFAULT_MODEL, ImageUrl, MessageContent};
use palaver_providers::GrokBackend;
use tracing::error;

const TRANSCRIBE_PROMPT: &str =
    "Transcribe all visible text in this image. Return only the transcribed text.";

/// Reads the text out of an image by asking the default vision model.
///
/// Used when the selected model has no vision capability of its own; the
/// transcript is then fed to it as ordinary text.
pub async fn image_text(vision: &GrokBackend, bytes: &[u8], content_type: &str) -> Option<String> {
    let turns = vec![ChatMessage::user(MessageContent::Parts(vec![
        ContentPart::ImageUrl {
            image_url: ImageUrl::high(image_data_url(bytes, content_type)),
        },
        ContentPart::Text {
            text: TRANSCRIBE_PROMPT.to_string(),
        },
    ]))];
    match vision.complete(DEFAULT_MODEL, turns, false).await {
        Ok(reply) => Some(reply.content),
        Err(e) => {
            error!("Image transcription failed: {e}");
            None
        }
    }
}

/// Data URL with the format taken from the download's Content-Type.
/// Anything that does not look like JPEG is labeled PNG.
pub fn image_data_url(bytes: &[u8], content_type: &str) -> String {
    let lowered = content_type.to_lowercase();
    let format = if lowered.contains("jpeg") || lowered.contains("jpg") {
        "jpeg"
    } else {
        "png"
    };
    format!("data:image/{format};base64,{}", STANDARD.encode(bytes))
}
