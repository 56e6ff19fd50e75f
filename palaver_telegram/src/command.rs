//! Slash commands understood by the gateway.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Model,
    Role,
    Balance(Option<String>),
    Clear,
    Search,
}

impl Command {
    /// Parses the leading token of a text message. Matching is
    /// case-insensitive and a trailing `@botname` mention is dropped.
    /// Unknown `/words` fall through to the conversation pipeline.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let head = trimmed.split_whitespace().next()?;
        if !head.starts_with('/') {
            return None;
        }
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        match name.as_str() {
            "/start" => Some(Self::Start),
            "/model" => Some(Self::Model),
            "/role" => Some(Self::Role),
            "/balance" => {
                let argument = trimmed
                    .strip_prefix(head)
                    .map(str::trim)
                    .filter(|rest| !rest.is_empty())
                    .map(str::to_lowercase);
                Some(Self::Balance(argument))
            }
            "/clear" => Some(Self::Clear),
            "/search" => Some(Self::Search),
            _ => None,
        }
    }

    #[must_use]
    pub const fn welcome_text() -> &'static str {
        "<b>Welcome to AI Assistant!</b> 😊\n\n\
         <b>Commands:</b>\n\
         - <code>/model</code>: Switch AI models (use grok-2-image for images)\n\
         - <code>/role</code>: Select role persona (catgirl, succubus, or Isla)\n\
         - <code>/clear</code>: Clear chat history\n\
         - <code>/search</code>: Toggle search mode\n\
         - <code>/balance [service]</code>: Check API balance\n\
         \u{2022} No args or <code>all</code>: Show all balances\n\
         \u{2022} <code>deepseek</code> or <code>ds</code>: DeepSeek only\n\
         \u{2022} <code>openrouter</code> or <code>or</code>: OpenRouter only\n\n\
         <b>Features:</b>\n\
         - Upload multiple images/files supported\n\
         - Voice and audio messages are transcribed automatically"
    }
}
