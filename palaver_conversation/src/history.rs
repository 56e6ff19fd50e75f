//! Bounded per-chat turn log.
//!
//! Turns are flattened to plain text before they land here, normalized so
//! reasoning preambles never survive into later prompts, and evicted from
//! the oldest end under a character budget and a hard turn cap.

use palaver_core::Role;
use palaver_markup::escape_pre_interiors;
use palaver_markup::render::{FINAL_ANSWER_MARKER, REASONING_MARKER};
use tracing::debug;

/// One stored conversation turn. By the time a turn reaches the log its
/// content is always text; attachment parts are resolved upstream and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTurn {
    pub role: Role,
    pub content: String,
}

impl StoredTurn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Character count of this turn's content.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Retention limits for one chat's log.
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    /// Hard cap on retained turns.
    pub max_turns: usize,
    /// Budget on summed content characters across the log.
    pub max_chars: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_chars: 120_000,
        }
    }
}

impl HistoryLimits {
    /// Set the turn cap.
    #[must_use]
    pub const fn with_max_turns(mut self, max: usize) -> Self {
        self.max_turns = max;
        self
    }

    /// Set the character budget.
    #[must_use]
    pub const fn with_max_chars(mut self, max: usize) -> Self {
        self.max_chars = max;
        self
    }
}

/// Normalize turn content for storage.
///
/// Code-block interiors are re-escaped first so stored replies cannot carry
/// live markup back into prompts. A rendered reply that contains the final
/// answer header keeps only what follows its last occurrence; a reasoning
/// section with no final answer stores nothing.
fn normalize_content(content: &str) -> String {
    let content = escape_pre_interiors(content);
    if let Some((_, answer)) = content.rsplit_once(FINAL_ANSWER_MARKER) {
        return answer.trim().to_string();
    }
    if content.contains(REASONING_MARKER) {
        return String::new();
    }
    content
}

/// Ordered log of turns for one chat. Eviction is FIFO: oldest turns are
/// silently dropped once limits are exceeded, with no compaction or
/// summarization.
#[derive(Debug, Clone, Default)]
pub struct TurnLog {
    turns: Vec<StoredTurn>,
}

impl TurnLog {
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Normalize and append a turn, then evict from the front while the
    /// character budget is exceeded, then hard-cap the turn count. The
    /// newest turn is always retained even when it alone exceeds the
    /// budget.
    pub fn append(&mut self, turn: StoredTurn, limits: &HistoryLimits) {
        let turn = StoredTurn {
            role: turn.role,
            content: normalize_content(&turn.content),
        };
        self.turns.push(turn);

        let mut total = self.char_count();
        while total > limits.max_chars && self.turns.len() > 1 {
            let removed = self.turns.remove(0);
            debug!(
                "Dropped oldest turn ({} chars) over character budget",
                removed.char_len()
            );
            total = self.char_count();
        }

        if self.turns.len() > limits.max_turns {
            let excess = self.turns.len() - limits.max_turns;
            self.turns.drain(..excess);
        }
    }

    /// Last `n` turns, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[StoredTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Drop every turn. Mode flags and selections live outside the log and
    /// are unaffected.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Summed character count across all turns.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.turns.iter().map(StoredTurn::char_len).sum()
    }

    #[must_use]
    pub fn turns(&self) -> &[StoredTurn] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(contents: &[&str], limits: &HistoryLimits) -> TurnLog {
        let mut log = TurnLog::new();
        for (i, content) in contents.iter().enumerate() {
            let role = if i % 2 == 0 {
                Role::User
            } else {
                Role::Assistant
            };
            log.append(StoredTurn::new(role, *content), limits);
        }
        log
    }

    #[test]
    fn test_append_and_recent() {
        let limits = HistoryLimits::default();
        let log = log_with(&["one", "two", "three"], &limits);
        assert_eq!(log.len(), 3);
        let recent: Vec<&str> = log.recent(2).iter().map(|t| t.content.as_str()).collect();
        assert_eq!(recent, vec!["two", "three"]);
        assert_eq!(log.recent(10).len(), 3);
    }

    #[test]
    fn test_final_answer_marker_stripped() {
        let limits = HistoryLimits::default();
        let log = log_with(&["🔍 <b>最终答案</b>: X"], &limits);
        assert_eq!(log.turns()[0].content, "X");
    }

    #[test]
    fn test_reasoning_without_answer_stores_empty() {
        let limits = HistoryLimits::default();
        let log = log_with(
            &["💭 <b>思考过程</b>:\n<blockquote expandable>hmm</blockquote>"],
            &limits,
        );
        assert_eq!(log.turns()[0].content, "");
    }

    #[test]
    fn test_rendered_reply_keeps_answer_section() {
        let limits = HistoryLimits::default();
        let content =
            "💭 <b>思考过程</b>:\n<blockquote expandable>steps</blockquote>\n\n🔍 <b>最终答案</b>:\nthe answer";
        let log = log_with(&[content], &limits);
        assert_eq!(log.turns()[0].content, "the answer");
    }

    #[test]
    fn test_pre_interiors_escaped_on_store() {
        let limits = HistoryLimits::default();
        let log = log_with(&["<pre>a < b</pre>"], &limits);
        assert_eq!(log.turns()[0].content, "<pre>a &lt; b</pre>");
    }

    #[test]
    fn test_char_budget_evicts_oldest() {
        let limits = HistoryLimits::default().with_max_chars(10);
        let log = log_with(&["aaaa", "bbbb", "cccc"], &limits);
        let kept: Vec<&str> = log.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(kept, vec!["bbbb", "cccc"]);
    }

    #[test]
    fn test_oversized_newest_turn_survives_alone() {
        let limits = HistoryLimits::default().with_max_chars(10);
        let mut log = log_with(&["aaaa", "bbbb"], &limits);
        log.append(StoredTurn::new(Role::User, "x".repeat(12)), &limits);
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns()[0].char_len(), 12);
    }

    #[test]
    fn test_turn_cap_keeps_most_recent() {
        let limits = HistoryLimits::default().with_max_turns(3);
        let log = log_with(&["a", "b", "c", "d", "e"], &limits);
        let kept: Vec<&str> = log.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(kept, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_char_count_uses_characters_not_bytes() {
        let limits = HistoryLimits::default();
        let log = log_with(&["你好世界"], &limits);
        assert_eq!(log.char_count(), 4);
    }

    #[test]
    fn test_clear_empties_log() {
        let limits = HistoryLimits::default();
        let mut log = log_with(&["one", "two"], &limits);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.char_count(), 0);
    }
}
