//! Process-wide gateway state behind a single lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use palaver_core::Role;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::context::{ChatContext, RolePrompt, UiTimer};
use crate::history::{HistoryLimits, StoredTurn};

/// One photo captured while a grouped upload burst accumulates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPhoto {
    pub file_id: String,
    pub caption: Option<String>,
}

/// Accumulating burst of grouped photos, flushed once by its timer.
#[derive(Debug)]
struct PhotoBatch {
    chat_id: i64,
    photos: Vec<PendingPhoto>,
    flush: Option<UiTimer>,
}

/// Everything request assembly needs from a chat, read in one critical
/// section.
#[derive(Debug, Clone)]
pub struct PromptSnapshot {
    pub model_id: String,
    pub persona: Option<String>,
    pub search_mode: bool,
    /// Recent window of the turn log, oldest first.
    pub recent: Vec<StoredTurn>,
}

#[derive(Debug, Default)]
struct GatewayState {
    contexts: HashMap<i64, ChatContext>,
    media_groups: HashMap<String, PhotoBatch>,
    processed_updates: HashSet<i64>,
}

/// In-memory store for every chat's context plus the cross-chat tables
/// (grouped uploads, handled update ids).
///
/// One mutex serializes every mutation across all chats; callers keep slow
/// network I/O outside it. Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    state: Arc<Mutex<GatewayState>>,
    limits: HistoryLimits,
}

impl ContextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with custom retention limits, for tests and tuning.
    #[must_use]
    pub fn with_limits(limits: HistoryLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(GatewayState::default())),
            limits,
        }
    }

    /// Check-and-insert an inbound update id. Returns `false` when the id
    /// was already handled, making redelivered webhooks a no-op.
    pub async fn mark_processed(&self, update_id: i64) -> bool {
        let mut state = self.state.lock().await;
        state.processed_updates.insert(update_id)
    }

    /// Normalize and append a turn to a chat's log, evicting per the
    /// retention limits.
    pub async fn append_turn(&self, chat_id: i64, role: Role, content: &str) {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        ctx.history
            .append(StoredTurn::new(role, content), &self.limits);
        debug!(
            "Chat {chat_id} history now {} turns / {} chars",
            ctx.history.len(),
            ctx.history.char_count()
        );
    }

    /// Last `n` turns of a chat's log, oldest first.
    pub async fn recent_turns(&self, chat_id: i64, n: usize) -> Vec<StoredTurn> {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        ctx.history.recent(n).to_vec()
    }

    /// Reset a chat's log. Mode flags and selections are untouched.
    pub async fn clear_history(&self, chat_id: i64) {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        ctx.history.clear();
    }

    pub async fn search_mode(&self, chat_id: i64) -> bool {
        let mut state = self.state.lock().await;
        state.contexts.entry(chat_id).or_default().search_mode
    }

    pub async fn set_search_mode(&self, chat_id: i64, enabled: bool) {
        let mut state = self.state.lock().await;
        state.contexts.entry(chat_id).or_default().search_mode = enabled;
    }

    /// Flip search mode and return the new state.
    pub async fn toggle_search_mode(&self, chat_id: i64) -> bool {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        ctx.search_mode = !ctx.search_mode;
        ctx.search_mode
    }

    /// Model id in effect for a chat.
    pub async fn model_id(&self, chat_id: i64) -> String {
        let mut state = self.state.lock().await;
        state
            .contexts
            .entry(chat_id)
            .or_default()
            .model_id()
            .to_string()
    }

    pub async fn set_model(&self, chat_id: i64, model: &str) {
        let mut state = self.state.lock().await;
        state.contexts.entry(chat_id).or_default().model = Some(model.to_string());
    }

    pub async fn persona(&self, chat_id: i64) -> Option<String> {
        let mut state = self.state.lock().await;
        state.contexts.entry(chat_id).or_default().persona.clone()
    }

    /// Select a persona, or cancel it when it is already active. Returns
    /// the persona now in effect.
    pub async fn toggle_persona(&self, chat_id: i64, persona: &str) -> Option<String> {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        if ctx.persona.as_deref() == Some(persona) {
            ctx.persona = None;
        } else {
            ctx.persona = Some(persona.to_string());
            info!("Switched persona for chat {chat_id} to {persona}");
        }
        ctx.persona.clone()
    }

    /// Atomically read what assembly needs from one chat.
    pub async fn prompt_snapshot(&self, chat_id: i64, window: usize) -> PromptSnapshot {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        PromptSnapshot {
            model_id: ctx.model_id().to_string(),
            persona: ctx.persona.clone(),
            search_mode: ctx.search_mode,
            recent: ctx.history.recent(window).to_vec(),
        }
    }

    /// Record the open persona keyboard for a chat. A previously armed
    /// timer is cancelled by the replacement.
    pub async fn arm_role_prompt(&self, chat_id: i64, message_id: i64, expiry: UiTimer) {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        ctx.role_prompt = Some(RolePrompt { message_id, expiry });
    }

    /// Message id of the open persona keyboard, if any.
    pub async fn role_prompt_message(&self, chat_id: i64) -> Option<i64> {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        ctx.role_prompt.as_ref().map(|rp| rp.message_id)
    }

    /// Forget the persona keyboard once its timer fired. The timer calls
    /// this about itself, so the handle is released rather than aborted.
    /// Returns `false` when the keyboard was already replaced.
    pub async fn expire_role_prompt(&self, chat_id: i64, message_id: i64) -> bool {
        let mut state = self.state.lock().await;
        let ctx = state.contexts.entry(chat_id).or_default();
        if let Some(rp) = ctx.role_prompt.take_if(|rp| rp.message_id == message_id) {
            rp.expiry.disarm();
            true
        } else {
            false
        }
    }

    /// Add a photo to a grouped upload burst. Returns `true` when this
    /// opens a new batch, in which case the caller schedules its flush.
    pub async fn buffer_grouped_photo(
        &self,
        group_id: &str,
        chat_id: i64,
        photo: PendingPhoto,
    ) -> bool {
        let mut state = self.state.lock().await;
        let mut opened = false;
        let batch = state
            .media_groups
            .entry(group_id.to_string())
            .or_insert_with(|| {
                opened = true;
                PhotoBatch {
                    chat_id,
                    photos: Vec::new(),
                    flush: None,
                }
            });
        batch.photos.push(photo);
        opened
    }

    /// Attach the flush timer to a pending batch.
    pub async fn arm_media_group_flush(&self, group_id: &str, flush: UiTimer) {
        let mut state = self.state.lock().await;
        if let Some(batch) = state.media_groups.get_mut(group_id) {
            batch.flush = Some(flush);
        }
    }

    /// Remove a batch for processing. The flush timer calls this about
    /// itself, so the handle is released, not aborted. A second call for
    /// the same group returns `None`, keeping the flush exactly-once.
    pub async fn take_media_group(&self, group_id: &str) -> Option<(i64, Vec<PendingPhoto>)> {
        let mut state = self.state.lock().await;
        let batch = state.media_groups.remove(group_id)?;
        if let Some(flush) = batch.flush {
            flush.disarm();
        }
        Some((batch.chat_id, batch.photos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::DEFAULT_MODEL;

    fn photo(file_id: &str) -> PendingPhoto {
        PendingPhoto {
            file_id: file_id.to_string(),
            caption: None,
        }
    }

    fn idle_timer() -> UiTimer {
        UiTimer::new(tokio::spawn(async {}))
    }

    #[tokio::test]
    async fn test_mark_processed_dedup() {
        let store = ContextStore::new();
        assert!(store.mark_processed(42).await);
        assert!(!store.mark_processed(42).await);
        assert!(store.mark_processed(43).await);
    }

    #[tokio::test]
    async fn test_lazy_context_defaults() {
        let store = ContextStore::new();
        assert!(!store.search_mode(7).await);
        assert_eq!(store.model_id(7).await, DEFAULT_MODEL);
        assert_eq!(store.persona(7).await, None);
        assert!(store.recent_turns(7, 6).await.is_empty());
    }

    #[tokio::test]
    async fn test_append_and_recent_turns() {
        let store = ContextStore::new();
        store.append_turn(1, Role::User, "hi").await;
        store.append_turn(1, Role::Assistant, "hello").await;
        store.append_turn(1, Role::User, "more").await;
        let recent = store.recent_turns(1, 2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "hello");
        assert_eq!(recent[1].content, "more");
        // Other chats are unaffected.
        assert!(store.recent_turns(2, 6).await.is_empty());
    }

    #[tokio::test]
    async fn test_limits_apply_per_chat() {
        let store = ContextStore::with_limits(HistoryLimits::default().with_max_turns(2));
        for content in ["a", "b", "c"] {
            store.append_turn(1, Role::User, content).await;
        }
        let recent = store.recent_turns(1, 10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "b");
    }

    #[tokio::test]
    async fn test_clear_history_keeps_flags() {
        let store = ContextStore::new();
        store.append_turn(5, Role::User, "hi").await;
        store.set_search_mode(5, true).await;
        store.set_model(5, "deepseek-chat").await;
        store.clear_history(5).await;
        assert!(store.recent_turns(5, 6).await.is_empty());
        assert!(store.search_mode(5).await);
        assert_eq!(store.model_id(5).await, "deepseek-chat");
    }

    #[tokio::test]
    async fn test_toggle_search_mode() {
        let store = ContextStore::new();
        assert!(store.toggle_search_mode(3).await);
        assert!(!store.toggle_search_mode(3).await);
    }

    #[tokio::test]
    async fn test_toggle_persona_cancels_on_repeat() {
        let store = ContextStore::new();
        assert_eq!(
            store.toggle_persona(1, "isla").await,
            Some("isla".to_string())
        );
        assert_eq!(
            store.toggle_persona(1, "neko_catgirl").await,
            Some("neko_catgirl".to_string())
        );
        assert_eq!(store.toggle_persona(1, "neko_catgirl").await, None);
    }

    #[tokio::test]
    async fn test_prompt_snapshot_reads_everything() {
        let store = ContextStore::new();
        store.set_model(9, "grok-3").await;
        store.toggle_persona(9, "isla").await;
        store.append_turn(9, Role::User, "one").await;
        store.append_turn(9, Role::Assistant, "two").await;
        let snap = store.prompt_snapshot(9, 1).await;
        assert_eq!(snap.model_id, "grok-3");
        assert_eq!(snap.persona, Some("isla".to_string()));
        assert!(!snap.search_mode);
        assert_eq!(snap.recent.len(), 1);
        assert_eq!(snap.recent[0].content, "two");
    }

    #[tokio::test]
    async fn test_role_prompt_lifecycle() {
        let store = ContextStore::new();
        assert_eq!(store.role_prompt_message(1).await, None);
        store.arm_role_prompt(1, 100, idle_timer()).await;
        assert_eq!(store.role_prompt_message(1).await, Some(100));

        // Replacement supersedes the old keyboard.
        store.arm_role_prompt(1, 101, idle_timer()).await;
        assert_eq!(store.role_prompt_message(1).await, Some(101));

        // A stale timer firing for the replaced message changes nothing.
        assert!(!store.expire_role_prompt(1, 100).await);
        assert_eq!(store.role_prompt_message(1).await, Some(101));

        assert!(store.expire_role_prompt(1, 101).await);
        assert_eq!(store.role_prompt_message(1).await, None);
    }

    #[tokio::test]
    async fn test_media_group_flushes_exactly_once() {
        let store = ContextStore::new();
        assert!(store.buffer_grouped_photo("g1", 5, photo("f1")).await);
        store.arm_media_group_flush("g1", idle_timer()).await;
        assert!(!store.buffer_grouped_photo("g1", 5, photo("f2")).await);
        assert!(!store.buffer_grouped_photo("g1", 5, photo("f3")).await);

        let Some((chat_id, photos)) = store.take_media_group("g1").await else {
            panic!("batch should be pending")
        };
        assert_eq!(chat_id, 5);
        let ids: Vec<&str> = photos.iter().map(|p| p.file_id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);

        assert!(store.take_media_group("g1").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = ContextStore::new();
        let clone = store.clone();
        clone.append_turn(2, Role::User, "shared").await;
        assert_eq!(store.recent_turns(2, 1).await[0].content, "shared");
    }
}
