//! DeepSeek adapter. The API has no native system role: the system prompt
//! folds into an opening user/assistant exchange and consecutive same-role
//! turns merge with a newline.

use crate::compat::CompatClient;
use crate::turns::{SYSTEM_ACK, strip_answer_preamble};
use async_trait::async_trait;
use palaver_core::{
    ChatBackend, ChatMessage, CompletionReply, GenerationParams, MessageContent, ProviderFamily,
};

const BASE_URL: &str = "https://api.deepseek.com/v1";

pub struct DeepSeekBackend {
    client: CompatClient,
    params: GenerationParams,
}

impl DeepSeekBackend {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self {
            client: CompatClient::new(api_key, BASE_URL),
            params: GenerationParams::default(),
        }
    }
}

/// Append a turn, merging into the previous one when roles repeat and both
/// sides are plain text.
fn push_merged(turns: &mut Vec<ChatMessage>, turn: ChatMessage) {
    if let Some(last) = turns.last_mut() {
        if last.role == turn.role {
            if let (MessageContent::Text(existing), Some(addition)) =
                (&mut last.content, turn.content.as_text())
            {
                existing.push('\n');
                existing.push_str(addition);
                return;
            }
        }
    }
    turns.push(turn);
}

#[async_trait]
impl ChatBackend for DeepSeekBackend {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::DeepSeek
    }

    fn build_turns(
        &self,
        system_prompt: &str,
        window: &[ChatMessage],
        incoming: Option<ChatMessage>,
    ) -> Vec<ChatMessage> {
        // The window folds separately so its first turn never merges into
        // the acknowledgment.
        let mut folded: Vec<ChatMessage> = Vec::with_capacity(window.len());
        for turn in window {
            let content: MessageContent = match turn.content.as_text() {
                Some(text) => strip_answer_preamble(text).into(),
                None => turn.content.clone(),
            };
            push_merged(&mut folded, ChatMessage::new(turn.role, content));
        }

        let mut turns = Vec::with_capacity(folded.len() + 3);
        turns.push(ChatMessage::user(system_prompt));
        turns.push(ChatMessage::assistant(SYSTEM_ACK));
        turns.append(&mut folded);
        if let Some(incoming) = incoming {
            push_merged(&mut turns, incoming);
        }
        turns
    }

    async fn complete(
        &self,
        model: &str,
        turns: Vec<ChatMessage>,
        _cache_hint: bool,
    ) -> anyhow::Result<CompletionReply> {
        Ok(self.client.complete(model, &turns, self.params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::Role;

    fn backend() -> DeepSeekBackend {
        DeepSeekBackend::new("key".to_string())
    }

    #[test]
    fn test_system_prompt_folds_into_opening_exchange() {
        let turns = backend().build_turns("be brief", &[], Some(ChatMessage::user("hi")));
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(turns[0].content.as_text(), Some("be brief"));
        assert_eq!(turns[1].content.as_text(), Some(SYSTEM_ACK));
        assert_eq!(turns[2].content.as_text(), Some("hi"));
    }

    #[test]
    fn test_consecutive_same_role_turns_merge() {
        let window = vec![
            ChatMessage::user("first"),
            ChatMessage::user("second"),
            ChatMessage::assistant("reply"),
        ];
        let turns = backend().build_turns("sys", &window, None);
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[2].content.as_text(), Some("first\nsecond"));
        assert_eq!(turns[3].content.as_text(), Some("reply"));
    }

    #[test]
    fn test_leading_assistant_turn_stays_separate_from_ack() {
        let window = vec![ChatMessage::assistant("earlier reply")];
        let turns = backend().build_turns("sys", &window, None);
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].content.as_text(), Some(SYSTEM_ACK));
        assert_eq!(turns[2].content.as_text(), Some("earlier reply"));
    }

    #[test]
    fn test_incoming_merges_into_trailing_user_turn() {
        let window = vec![ChatMessage::user("question")];
        let turns = backend().build_turns("sys", &window, Some(ChatMessage::user("more")));
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].content.as_text(), Some("question\nmore"));
    }

    #[test]
    fn test_window_preamble_stripped() {
        let window = vec![ChatMessage::assistant("🔍 <b>最终答案</b>: 42")];
        let turns = backend().build_turns("sys", &window, None);
        assert_eq!(turns[2].content.as_text(), Some("42"));
    }
}
