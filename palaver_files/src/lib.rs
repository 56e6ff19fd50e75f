//! Attachment retrieval and text extraction.
//!
//! Everything a chat attachment can become text through lives here:
//! resolving and downloading Telegram files, local extraction for plain
//! text, PDF and DOCX, image transcription through a vision model, and
//! speech-to-text for voice notes. All of it is in-memory; nothing touches
//! the filesystem.

pub mod extract;
pub mod fetch;
pub mod ocr;
pub mod transcribe;

pub use fetch::{FetchedFile, FileGateway};
pub use transcribe::TranscriptionClient;

use palaver_providers::GrokBackend;
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];
const AUDIO_EXTENSIONS: &[&str] = &[".ogg", ".oga", ".mp3", ".wav", ".m4a", ".flac"];

fn has_extension(file_name: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| file_name.ends_with(ext))
}

/// Downloads one attachment and reduces it to text by extension.
///
/// `None` covers download failures, extraction failures, and unsupported
/// file types alike; callers turn it into the user-facing error for their
/// attachment kind.
pub async fn parse_attachment(
    gateway: &FileGateway,
    vision: &GrokBackend,
    transcriber: &TranscriptionClient,
    file_id: &str,
    file_name: &str,
) -> Option<String> {
    debug!("Downloading attachment: {file_name}");
    let fetched = gateway.download(file_id).await?;

    debug!("Parsing attachment: {file_name}");
    if file_name.ends_with(".txt") {
        extract::plain_text(&fetched.bytes)
    } else if file_name.ends_with(".pdf") {
        extract::pdf_text(&fetched.bytes)
    } else if file_name.ends_with(".docx") {
        extract::docx_text(&fetched.bytes)
    } else if has_extension(file_name, IMAGE_EXTENSIONS) {
        ocr::image_text(vision, &fetched.bytes, &fetched.content_type).await
    } else if has_extension(file_name, AUDIO_EXTENSIONS) {
        transcriber
            .transcribe(file_name, &fetched.content_type, fetched.bytes)
            .await
    } else {
        warn!("Unsupported file type: {file_name}");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{AUDIO_EXTENSIONS, IMAGE_EXTENSIONS, has_extension};

    #[test]
    fn test_extension_match_is_suffix_based() {
        assert!(has_extension("photo_abc123.jpg", IMAGE_EXTENSIONS));
        assert!(has_extension("voice_abc123.ogg", AUDIO_EXTENSIONS));
        assert!(!has_extension("notes.txt", IMAGE_EXTENSIONS));
        // Extension matching is case-sensitive, like the dispatch itself.
        assert!(!has_extension("SCAN.JPG", IMAGE_EXTENSIONS));
    }
}
