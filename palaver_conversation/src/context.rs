//! Per-chat mutable state.

use palaver_core::DEFAULT_MODEL;
use tokio::task::JoinHandle;

use crate::history::TurnLog;

/// Handle for a scheduled UI cleanup task. Dropping the handle aborts the
/// task, so replacing a timer cancels the previous one; [`UiTimer::disarm`]
/// instead releases the task to finish on its own.
#[derive(Debug)]
pub struct UiTimer {
    handle: Option<JoinHandle<()>>,
}

impl UiTimer {
    #[must_use]
    pub const fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Let the task run to completion without keeping the handle.
    pub fn disarm(mut self) {
        self.handle.take();
    }
}

impl Drop for UiTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// The live persona-selection keyboard for a chat, paired with its
/// auto-delete timer.
#[derive(Debug)]
pub struct RolePrompt {
    pub message_id: i64,
    pub expiry: UiTimer,
}

/// All per-chat gateway state: the turn log, mode flags, and selections.
/// Created lazily on first contact and kept for the process lifetime.
#[derive(Debug, Default)]
pub struct ChatContext {
    pub history: TurnLog,
    /// When set, the next text turn is treated as a search query.
    pub search_mode: bool,
    /// Selected model id; the gateway default applies when unset.
    pub model: Option<String>,
    /// Selected persona id; `None` renders the base system prompt.
    pub persona: Option<String>,
    /// Open persona keyboard, if one is on screen.
    pub role_prompt: Option<RolePrompt>,
}

impl ChatContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Model id in effect for this chat.
    #[must_use]
    pub fn model_id(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}
