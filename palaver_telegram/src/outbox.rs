//! Outbound delivery: repair, splitting, paced chunk sends, retry with a
//! plain-text fallback, and ephemeral keyboard messages.

use crate::client::TelegramClient;
use crate::error::Result;
use palaver_core::PERSONAS;
use palaver_markup::render::FINAL_ANSWER_MARKER;
use palaver_markup::{escape, is_balanced, repair, sanitize, split_message, strip_tags};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Working send limit, kept under the platform's 4096 cap to leave room
/// for tags reopened at chunk seams.
const SEND_MAX_CHARS: usize = 4000;
/// Replacement body when a reply would otherwise be blank.
const EMPTY_SEND_NOTICE: &str = "⚠️ No valid content to send";
/// Hard cap for the stripped plain-text fallback.
const FALLBACK_MAX_CHARS: usize = 3000;
/// Seconds slept before the second and third attempt of one message.
const SINGLE_RETRY_DELAYS: [u64; 2] = [1, 2];
/// Pause between consecutive chunks of one split message.
const CHUNK_PACING: Duration = Duration::from_secs(1);
/// Seconds slept before each chunk-level retry after delivery failed.
const CHUNK_RETRY_PAUSE: Duration = Duration::from_secs(2);

const ROLE_PROMPT_TEXT: &str = "选择角色设定 (再次点击取消):";
const ROLE_LIST_FAILED: &str = "❌ 无法显示角色列表，请重试";

#[derive(Clone)]
pub struct Outbox {
    client: TelegramClient,
    deleted: Arc<Mutex<HashSet<(i64, i64)>>>,
}

impl Outbox {
    #[must_use]
    pub fn new(client: TelegramClient) -> Self {
        Self {
            client,
            deleted: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Full delivery cascade. Text is escaped unless `pre_escaped`,
    /// repaired until balanced, split when over the working limit, and
    /// each chunk is delivered with pacing and retries.
    pub async fn send(&self, chat_id: i64, text: &str, pre_escaped: bool) {
        let staged = prepare(text, pre_escaped);
        if staged.chars().count() <= SEND_MAX_CHARS {
            if let Err(e) = self.send_single(chat_id, &staged).await {
                error!("Message delivery failed: {e}");
            }
            return;
        }
        let needs_pre_patch = staged.contains("<pre>");
        let chunks = split_message(&staged, SEND_MAX_CHARS);
        let total = chunks.len();
        for (i, chunk) in chunks.into_iter().enumerate() {
            let chunk = if needs_pre_patch {
                patch_pre_continuation(chunk)
            } else {
                chunk
            };
            debug!("Sending split message {}/{total}", i + 1);
            if self.send_chunk(chat_id, &chunk).await {
                tokio::time::sleep(CHUNK_PACING).await;
            }
        }
    }

    /// One chunk of a split message, retried twice after the inner
    /// cascade has already given up.
    async fn send_chunk(&self, chat_id: i64, chunk: &str) -> bool {
        match self.send_single(chat_id, chunk).await {
            Ok(()) => return true,
            Err(e) => warn!("Chunk delivery failed: {e}"),
        }
        for attempt in 1..=2u32 {
            tokio::time::sleep(CHUNK_RETRY_PAUSE).await;
            match self.send_single(chat_id, chunk).await {
                Ok(()) => {
                    info!("Retry {attempt} succeeded");
                    return true;
                }
                Err(e) => warn!("Retry {attempt} failed: {e}"),
            }
        }
        false
    }

    /// One message: three HTML attempts, downgrading to tag-stripped plain
    /// text when Telegram rejects the entities, then a final capped
    /// plain-text fallback.
    async fn send_single(&self, chat_id: i64, text: &str) -> Result<()> {
        let staged = finalize(text);
        let mut body = staged.clone();
        let mut parse_mode = Some("HTML");
        for attempt in 0..=SINGLE_RETRY_DELAYS.len() {
            let mut payload = json!({
                "chat_id": chat_id,
                "text": body,
                "disable_web_page_preview": true,
            });
            if let Some(mode) = parse_mode {
                payload["parse_mode"] = Value::String(mode.to_string());
            }
            match self.client.call("sendMessage", &payload).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_entity_parse_failure() => {
                    warn!("Entity parse failure, retrying without parse mode: {e}");
                    parse_mode = None;
                    body = strip_tags(&body);
                }
                Err(e) => {
                    warn!("sendMessage attempt {} failed: {e}", attempt + 1);
                    if let Some(&pause) = SINGLE_RETRY_DELAYS.get(attempt) {
                        tokio::time::sleep(Duration::from_secs(pause)).await;
                    }
                }
            }
        }
        let mut plain = strip_tags(&staged);
        if plain.chars().count() > FALLBACK_MAX_CHARS {
            plain = plain.chars().take(FALLBACK_MAX_CHARS).collect();
            plain.push_str("...(truncated)");
        }
        self.client
            .call("sendMessage", &json!({ "chat_id": chat_id, "text": plain }))
            .await
            .map(|_| ())
    }

    /// Sends a one-column inline keyboard and schedules its deletion after
    /// `timeout`. Returns the message id when the send succeeded.
    pub async fn send_list_with_timeout(
        &self,
        chat_id: i64,
        prompt: &str,
        items: &[&str],
        timeout: Duration,
    ) -> Option<i64> {
        let keyboard =
            inline_keyboard(items.iter().map(|item| ((*item).to_string(), (*item).to_string())));
        let message_id = self.send_keyboard(chat_id, prompt, &keyboard).await?;
        let outbox = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            outbox.delete_message(chat_id, message_id).await;
        });
        Some(message_id)
    }

    /// Persona picker. On failure the user gets a short retry notice
    /// instead of silence.
    pub async fn send_role_list(&self, chat_id: i64, active: Option<&str>) -> Option<i64> {
        let keyboard = persona_keyboard(active);
        let message_id = self.send_keyboard(chat_id, ROLE_PROMPT_TEXT, &keyboard).await;
        if message_id.is_none() {
            self.send(chat_id, ROLE_LIST_FAILED, false).await;
        }
        message_id
    }

    /// Refreshes an existing persona picker in place.
    pub async fn update_role_list(&self, chat_id: i64, message_id: i64, active: Option<&str>) -> bool {
        let keyboard = persona_keyboard(active);
        match self
            .client
            .edit_message_text(chat_id, message_id, ROLE_PROMPT_TEXT, &keyboard)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to update role list: {e}");
                false
            }
        }
    }

    async fn send_keyboard(&self, chat_id: i64, prompt: &str, keyboard: &Value) -> Option<i64> {
        let payload = json!({
            "chat_id": chat_id,
            "text": escape(prompt),
            "parse_mode": "HTML",
            "reply_markup": keyboard,
        });
        match self.client.call("sendMessage", &payload).await {
            Ok(result) => result["message_id"].as_i64(),
            Err(e) => {
                error!("Failed to send selection list: {e}");
                None
            }
        }
    }

    /// Best-effort delete with process-lifetime dedup. The lock is held
    /// across the API call so concurrent deletes of the same message
    /// cannot interleave.
    pub async fn delete_message(&self, chat_id: i64, message_id: i64) {
        let mut deleted = self.deleted.lock().await;
        if deleted.contains(&(chat_id, message_id)) {
            debug!("Message {message_id} already deleted, skipping");
            return;
        }
        match self.client.delete_message(chat_id, message_id).await {
            Ok(()) => {
                deleted.insert((chat_id, message_id));
                debug!("Deleted message {message_id} in chat {chat_id}");
            }
            Err(e) => warn!("Failed to delete message {message_id}: {e}"),
        }
    }
}

/// Staging pass shared by every send: escape unless pre-escaped, repair
/// until balanced, close a dangling expandable quote, and normalize
/// literal `\n` sequences the model sometimes emits.
fn prepare(text: &str, pre_escaped: bool) -> String {
    if text.trim().is_empty() {
        return EMPTY_SEND_NOTICE.to_string();
    }
    let mut staged = if pre_escaped {
        text.to_string()
    } else {
        escape(text)
    };
    if !is_balanced(&staged) {
        staged = repair(&staged);
        if !is_balanced(&staged) {
            staged = sanitize(&staged);
        }
    }
    if staged.contains("<blockquote") && !staged.contains("</blockquote>") {
        staged.push_str("</blockquote>");
    }
    if staged.contains(FINAL_ANSWER_MARKER) && !is_balanced(&staged) {
        staged = repair(&staged);
    }
    staged.replace("\\n", "\n")
}

/// Last repair pass immediately before the wire.
fn finalize(text: &str) -> String {
    let mut staged = repair(text);
    if !is_balanced(&staged) {
        staged = sanitize(&staged);
    }
    staged = sanitize(&staged);
    if !is_balanced(&staged) {
        staged = repair(&staged);
    }
    staged
}

/// Reopens `<pre>` on continuation chunks that clearly carry code, and
/// closes it when a chunk opens a block it never closes.
fn patch_pre_continuation(mut chunk: String) -> String {
    let head: String = chunk.chars().take(50).collect();
    if !head.contains("<pre>")
        && (chunk.contains("```") || chunk.contains("    ") || chunk.contains('\t'))
    {
        chunk.insert_str(0, "<pre>");
    }
    let head: String = chunk.chars().take(50).collect();
    if head.contains("<pre>") && !tail_chars(&chunk, 50).contains("</pre>") {
        chunk.push_str("</pre>");
    }
    chunk
}

fn tail_chars(text: &str, n: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(n)).collect()
}

fn inline_keyboard(rows: impl IntoIterator<Item = (String, String)>) -> Value {
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|(text, data)| json!([{ "text": text, "callback_data": data }]))
        .collect();
    json!({ "inline_keyboard": rows })
}

/// One row per persona; the active one carries a check suffix.
fn persona_keyboard(active: Option<&str>) -> Value {
    inline_keyboard(PERSONAS.iter().map(|spec| {
        let label = if active == Some(spec.key) {
            format!("{} √", spec.display_name)
        } else {
            spec.display_name.to_string()
        };
        (label, spec.key.to_string())
    }))
}

#[cfg(test)]
mod tests {
    use super::{
        EMPTY_SEND_NOTICE, finalize, inline_keyboard, patch_pre_continuation, persona_keyboard,
        prepare, tail_chars,
    };

    #[test]
    fn test_prepare_blank_input_becomes_notice() {
        assert_eq!(prepare("   ", false), EMPTY_SEND_NOTICE);
        assert_eq!(prepare("", true), EMPTY_SEND_NOTICE);
    }

    #[test]
    fn test_prepare_escapes_unless_pre_escaped() {
        assert_eq!(prepare("a < b", false), "a &lt; b");
        assert_eq!(prepare("<b>bold</b>", true), "<b>bold</b>");
    }

    #[test]
    fn test_prepare_repairs_unbalanced_markup() {
        let staged = prepare("<b>dangling", true);
        assert!(palaver_markup::is_balanced(&staged));
    }

    #[test]
    fn test_prepare_closes_dangling_blockquote() {
        let staged = prepare("<blockquote expandable>thought", true);
        assert!(staged.ends_with("</blockquote>"));
    }

    #[test]
    fn test_prepare_normalizes_literal_newlines() {
        assert_eq!(prepare("line one\\nline two", true), "line one\nline two");
    }

    #[test]
    fn test_finalize_output_is_balanced() {
        assert!(palaver_markup::is_balanced(&finalize("<i>lean")));
        assert!(palaver_markup::is_balanced(&finalize("plain text")));
    }

    #[test]
    fn test_pre_patch_reopens_code_continuation() {
        let chunk = "    let x = 1;\n    let y = 2;".to_string();
        let patched = patch_pre_continuation(chunk);
        assert!(patched.starts_with("<pre>"));
        assert!(patched.ends_with("</pre>"));
    }

    #[test]
    fn test_pre_patch_leaves_prose_alone() {
        let chunk = "just a sentence without code markers".to_string();
        assert_eq!(patch_pre_continuation(chunk.clone()), chunk);
    }

    #[test]
    fn test_pre_patch_closes_open_block() {
        let chunk = "<pre>fn main() {}".to_string();
        let patched = patch_pre_continuation(chunk);
        assert!(patched.ends_with("</pre>"));
        assert!(!patched.starts_with("<pre><pre>"));
    }

    #[test]
    fn test_pre_patch_skips_already_closed_chunk() {
        let chunk = "<pre>fn main() {}</pre>".to_string();
        assert_eq!(patch_pre_continuation(chunk.clone()), chunk);
    }

    #[test]
    fn test_tail_chars_handles_short_input() {
        assert_eq!(tail_chars("abc", 50), "abc");
        assert_eq!(tail_chars("abcdef", 3), "def");
    }

    #[test]
    fn test_inline_keyboard_one_button_per_row() {
        let keyboard = inline_keyboard(vec![
            ("first".to_string(), "first".to_string()),
            ("second".to_string(), "second".to_string()),
        ]);
        let rows = &keyboard["inline_keyboard"];
        assert_eq!(rows.as_array().map(Vec::len), Some(2));
        assert_eq!(rows[0][0]["text"].as_str(), Some("first"));
        assert_eq!(rows[1][0]["callback_data"].as_str(), Some("second"));
    }

    #[test]
    fn test_persona_keyboard_marks_active_selection() {
        let keyboard = persona_keyboard(Some("neko_catgirl"));
        let rows = keyboard["inline_keyboard"]
            .as_array()
            .map_or_else(Vec::new, Clone::clone);
        assert_eq!(rows.len(), palaver_core::PERSONAS.len());
        assert_eq!(rows[0][0]["text"].as_str(), Some("猫娘 √"));
        assert_eq!(rows[0][0]["callback_data"].as_str(), Some("neko_catgirl"));
        assert_eq!(rows[1][0]["text"].as_str(), Some("魅魔"));
    }

    #[test]
    fn test_persona_keyboard_without_selection_has_no_suffix() {
        let keyboard = persona_keyboard(None);
        let rows = &keyboard["inline_keyboard"];
        assert_eq!(rows[2][0]["text"].as_str(), Some("Isla"));
    }
}
