//! Turn-sequence helpers shared across provider families.

use palaver_core::{ChatMessage, estimate_tokens};
use palaver_markup::render::FINAL_ANSWER_MARKER;

/// Synthetic confirmation standing in for a system turn on families
/// without a native system role.
pub(crate) const SYSTEM_ACK: &str = "Understood, I'll follow your instructions. What do you need?";

/// Prompt-cache hints turn on at this estimated request size.
const CACHE_THRESHOLD_TOKENS: usize = 1024;

/// Decide whether the request is large enough to mark for ephemeral
/// caching. Counts the system prompt, the fold acknowledgment (for every
/// family), the window, and the incoming text.
#[must_use]
pub fn wants_cache(system_prompt: &str, window: &[ChatMessage], incoming_text: &str) -> bool {
    let mut total = estimate_tokens(system_prompt) + estimate_tokens(SYSTEM_ACK);
    for turn in window {
        if let Some(text) = turn.content.as_text() {
            total += estimate_tokens(text);
        }
    }
    total += estimate_tokens(incoming_text);
    total >= CACHE_THRESHOLD_TOKENS
}

/// Everything after the last final-answer preamble, trimmed. A rendered
/// reply that slipped into the window goes back upstream as the bare
/// answer; content without the marker passes through untouched.
pub(crate) fn strip_answer_preamble(content: &str) -> &str {
    content
        .rsplit_once(FINAL_ANSWER_MARKER)
        .map_or(content, |(_, answer)| answer.trim())
}

fn stripped(turn: &ChatMessage) -> ChatMessage {
    match turn.content.as_text() {
        Some(text) => ChatMessage::new(turn.role, strip_answer_preamble(text)),
        None => turn.clone(),
    }
}

/// System-led arrangement used by every family with a native system role.
pub(crate) fn system_led_turns(
    system_prompt: &str,
    window: &[ChatMessage],
    incoming: Option<ChatMessage>,
) -> Vec<ChatMessage> {
    let mut turns = Vec::with_capacity(window.len() + 2);
    turns.push(ChatMessage::system(system_prompt));
    turns.extend(window.iter().map(stripped));
    turns.extend(incoming);
    turns
}
