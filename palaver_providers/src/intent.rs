//! Search-intent optimization through the default vision model.

use crate::GrokBackend;
use palaver_core::{ChatBackend, ChatMessage, DEFAULT_MODEL};
use tracing::{debug, error, warn};

/// Condense free-form input into concise search terms. Any failure falls
/// back to the raw input with the search-request phrase removed.
pub async fn optimize_search_intent(grok: &GrokBackend, user_input: &str) -> String {
    let instructions = format!(
        "You are a search intent optimizer. User input: \"{user_input}\"\n\
         Your task is to extract key information and optimize it into concise search terms.\n\
         - Return only the optimized text\n\
         - If input is already clear, return core keywords\n\
         - If unclear, make reasonable inference\n\
         - Return \"Cannot optimize\" only if completely unclear"
    );
    let turns = vec![ChatMessage::system(instructions)];
    match grok.complete(DEFAULT_MODEL, turns, false).await {
        Ok(reply) => {
            debug!("Raw optimization response: {}", reply.content);
            let optimized = reply.content.trim();
            if optimized.is_empty() {
                warn!("Optimization returned empty for '{user_input}', falling back");
                fallback_query(user_input)
            } else {
                optimized.to_string()
            }
        }
        Err(e) => {
            error!("Search intent optimization failed: {e}");
            fallback_query(user_input)
        }
    }
}

/// Text before the "帮我搜索" request phrase, or the whole input when the
/// phrase is absent.
fn fallback_query(user_input: &str) -> String {
    user_input
        .split_once("帮我搜索")
        .map_or(user_input, |(head, _)| head)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_keeps_text_before_phrase() {
        assert_eq!(fallback_query("rust 异步运行时 帮我搜索一下"), "rust 异步运行时");
    }

    #[test]
    fn test_fallback_without_phrase_trims_input() {
        assert_eq!(fallback_query("  tokio select  "), "tokio select");
    }

    #[test]
    fn test_fallback_with_leading_phrase_is_empty() {
        assert_eq!(fallback_query("帮我搜索 tokio"), "");
    }
}
