//! Final assembly of a model reply for Telegram.
//!
//! Translates Markdown code fences into Telegram's `<pre><code>` form,
//! escapes what needs escaping, repairs tag structure, and stitches the
//! optional reasoning section and the token usage bar onto the answer.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use palaver_core::{CompletionReply, Usage};

use crate::balance::repair;
use crate::escape::escape;
use crate::SUPPORTED_TAGS;

/// Reply sent when the model produced no content.
pub const EMPTY_RESPONSE: &str = "⚠️ 空响应，请重试";
/// Reply sent when a provider request came back non-200.
pub const REQUEST_FAILED: &str = "⏳ 请求失败，请重试";
/// Reply sent when the pipeline failed for any other reason.
pub const PIPELINE_ERROR: &str = "⏳ 请求超时或发生错误，请重试";
/// Reply sent when the configured model maps to no known provider.
pub const UNSUPPORTED_MODEL: &str = "⚠️ Unsupported model type";
/// Placeholder some providers return instead of omitting reasoning.
pub const NO_REASONING_PLACEHOLDER: &str = "No reasoning provided";
/// Usage block shown when the provider returned no usage data.
pub const USAGE_UNAVAILABLE: &str = "<pre>Usage 数据不可用</pre>";
/// Header line introducing the answer after a reasoning section. The
/// conversation store strips it from recorded turns.
pub const FINAL_ANSWER_MARKER: &str = "🔍 <b>最终答案</b>:";
/// Header line opening the collapsible reasoning section.
pub const REASONING_MARKER: &str = "💭 <b>思考过程</b>:";

const MAX_BAR: u64 = 24;

static FENCE: OnceLock<Regex> = OnceLock::new();
static BARE_PRE: OnceLock<Regex> = OnceLock::new();
static QUOTED_ANCHOR: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn fence() -> &'static Regex {
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(\w+)?\n(.*?)\n```")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn bare_pre() -> &'static Regex {
    BARE_PRE.get_or_init(|| {
        Regex::new(r"(?s)<pre>(.*?)</pre>")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn quoted_anchor() -> &'static Regex {
    QUOTED_ANCHOR.get_or_init(|| {
        Regex::new(r"(?s)&lt;a\s+href=&quot;(.*?)&quot;&gt;(.*?)&lt;/a&gt;")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

/// A formatted reply: `full` is what goes to Telegram, `answer` is the
/// clean content recorded as the assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub full: String,
    pub answer: String,
}

/// Whether a reply text is one of the failure sentinels rather than model
/// content.
#[must_use]
pub fn is_error_reply(text: &str) -> bool {
    text.starts_with("⏳") || text.starts_with("⚠️")
}

fn wrap_code(code: &str) -> String {
    let stripped = code.trim();
    if stripped.contains('\n') {
        format!("<pre><code>{stripped}</code></pre>")
    } else {
        format!("<code>{stripped}</code>")
    }
}

/// Translate Markdown code fences into `<pre><code>` (multi-line) or
/// `<code>` (single line), then normalize bare `<pre>` blocks the same way.
#[must_use]
pub fn format_code_blocks(content: &str) -> String {
    let content = fence().replace_all(content, |caps: &Captures<'_>| wrap_code(&caps[2]));
    bare_pre()
        .replace_all(&content, |caps: &Captures<'_>| {
            let inner = &caps[1];
            if inner.starts_with("<code>") {
                caps[0].to_string()
            } else {
                wrap_code(inner)
            }
        })
        .into_owned()
}

/// Escape everything in reasoning text, quotes included; it renders inside
/// a blockquote and gets no tag whitelist.
#[must_use]
pub fn escape_reasoning(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Bring entity-encoded supported tags back to live form, anchors first.
#[must_use]
pub fn restore_supported_tags(text: &str) -> String {
    let text = quoted_anchor().replace_all(text, r#"<a href="${1}">${2}</a>"#);
    let mut out = text.into_owned();
    for tag in SUPPORTED_TAGS {
        out = out.replace(&format!("&lt;{tag}&gt;"), &format!("<{tag}>"));
        out = out.replace(&format!("&lt;/{tag}&gt;"), &format!("</{tag}>"));
    }
    out
}

fn bar_len(part: u32, total: u32) -> usize {
    if total == 0 {
        return 0;
    }
    let len = (u64::from(part) * MAX_BAR / u64::from(total)).min(MAX_BAR);
    usize::try_from(len).unwrap_or(24)
}

/// Render the token usage bar, scaled so the total row is always full.
#[must_use]
pub fn render_usage(usage: Option<&Usage>) -> String {
    let Some(usage) = usage else {
        return USAGE_UNAVAILABLE.to_string();
    };
    let input_bar = "=".repeat(bar_len(usage.prompt_tokens, usage.total_tokens));
    let output_bar = "=".repeat(bar_len(usage.completion_tokens, usage.total_tokens));
    let total_bar = "=".repeat(24);
    format!(
        "<pre><code>输入: [{input_bar} {}]\n输出: [{output_bar} {}]\n总计: [{total_bar} {}]</code></pre>",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    )
}

fn has_presentable_reasoning(reasoning: &str) -> bool {
    let trimmed = reasoning.trim();
    !trimmed.is_empty() && trimmed != NO_REASONING_PLACEHOLDER
}

/// Format a completion into the outgoing reply and the clean answer text.
/// Never fails; an empty completion yields the empty-response sentinel.
#[must_use]
pub fn render_reply(reply: &CompletionReply) -> Rendered {
    if reply.content.is_empty() {
        return Rendered {
            full: EMPTY_RESPONSE.to_string(),
            answer: String::new(),
        };
    }

    let staged = format_code_blocks(&reply.content);
    let staged = escape(&staged)
        .replace("<br/>", "\n")
        .replace("<br>", "\n");
    let answer = restore_supported_tags(&repair(&staged));
    let usage_block = render_usage(reply.usage.as_ref());

    let full = match &reply.reasoning {
        Some(reasoning) if has_presentable_reasoning(reasoning) => {
            let escaped = escape_reasoning(reasoning);
            format!(
                "{REASONING_MARKER}\n<blockquote expandable>{escaped}</blockquote>\n\n{FINAL_ANSWER_MARKER}\n{answer}\n\n{usage_block}"
            )
        }
        _ => format!("{answer}\n\n{usage_block}"),
    };

    Rendered { full, answer }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(content: &str, reasoning: Option<&str>, usage: Option<Usage>) -> CompletionReply {
        CompletionReply {
            content: content.to_string(),
            reasoning: reasoning.map(str::to_string),
            usage,
        }
    }

    #[test]
    fn test_fence_multiline_becomes_pre_code() {
        let out = format_code_blocks("Use:\n```rust\nlet x = 1;\nlet y = 2;\n```\ndone");
        assert_eq!(out, "Use:\n<pre><code>let x = 1;\nlet y = 2;</code></pre>\ndone");
    }

    #[test]
    fn test_fence_single_line_becomes_code() {
        assert_eq!(format_code_blocks("```py\nprint(1)\n```"), "<code>print(1)</code>");
        assert_eq!(format_code_blocks("```\nls -la\n```"), "<code>ls -la</code>");
    }

    #[test]
    fn test_bare_pre_normalized() {
        assert_eq!(format_code_blocks("<pre>single</pre>"), "<code>single</code>");
        assert_eq!(
            format_code_blocks("<pre>a\nb</pre>"),
            "<pre><code>a\nb</code></pre>"
        );
        let wrapped = "<pre><code>x</code></pre>";
        assert_eq!(format_code_blocks(wrapped), wrapped);
    }

    #[test]
    fn test_unclosed_fence_left_alone() {
        let text = "```rust\nlet x = 1;";
        assert_eq!(format_code_blocks(text), text);
    }

    #[test]
    fn test_usage_bar_scaling() {
        let usage = Usage {
            prompt_tokens: 300,
            completion_tokens: 100,
            total_tokens: 400,
        };
        let out = render_usage(Some(&usage));
        assert_eq!(
            out,
            format!(
                "<pre><code>输入: [{} 300]\n输出: [{} 100]\n总计: [{} 400]</code></pre>",
                "=".repeat(18),
                "=".repeat(6),
                "=".repeat(24)
            )
        );
    }

    #[test]
    fn test_usage_missing_and_zero() {
        assert_eq!(render_usage(None), USAGE_UNAVAILABLE);
        let zero = Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
        };
        let out = render_usage(Some(&zero));
        assert!(out.contains("输入: [ 0]"));
    }

    #[test]
    fn test_restore_supported_tags() {
        assert_eq!(restore_supported_tags("&lt;b&gt;x&lt;/b&gt;"), "<b>x</b>");
        assert_eq!(
            restore_supported_tags("&lt;a href=&quot;https://e.com&quot;&gt;t&lt;/a&gt;"),
            r#"<a href="https://e.com">t</a>"#
        );
        assert_eq!(restore_supported_tags("&lt;div&gt;"), "&lt;div&gt;");
    }

    #[test]
    fn test_render_empty_content() {
        let rendered = render_reply(&reply("", None, None));
        assert_eq!(rendered.full, EMPTY_RESPONSE);
        assert_eq!(rendered.answer, "");
    }

    #[test]
    fn test_render_plain_reply() {
        let rendered = render_reply(&reply("hello", None, None));
        assert_eq!(rendered.full, format!("hello\n\n{USAGE_UNAVAILABLE}"));
        assert_eq!(rendered.answer, "hello");
    }

    #[test]
    fn test_render_with_reasoning() {
        let rendered = render_reply(&reply("ok", Some("because <x>"), None));
        assert_eq!(
            rendered.full,
            format!(
                "💭 <b>思考过程</b>:\n<blockquote expandable>because &lt;x&gt;</blockquote>\n\n🔍 <b>最终答案</b>:\nok\n\n{USAGE_UNAVAILABLE}"
            )
        );
        assert_eq!(rendered.answer, "ok");
    }

    #[test]
    fn test_render_skips_placeholder_reasoning() {
        let rendered = render_reply(&reply("ok", Some("No reasoning provided"), None));
        assert_eq!(rendered.full, format!("ok\n\n{USAGE_UNAVAILABLE}"));
        let rendered = render_reply(&reply("ok", Some("   "), None));
        assert_eq!(rendered.full, format!("ok\n\n{USAGE_UNAVAILABLE}"));
    }

    #[test]
    fn test_render_repairs_model_markup() {
        let rendered = render_reply(&reply("<b>bold", None, None));
        assert_eq!(rendered.answer, "<b>bold</b>");
    }

    #[test]
    fn test_render_escapes_loose_angle_brackets() {
        let rendered = render_reply(&reply("a < b", None, None));
        assert_eq!(rendered.answer, "a &lt; b");
    }

    #[test]
    fn test_error_reply_detection() {
        assert!(is_error_reply(EMPTY_RESPONSE));
        assert!(is_error_reply(REQUEST_FAILED));
        assert!(is_error_reply(PIPELINE_ERROR));
        assert!(is_error_reply(UNSUPPORTED_MODEL));
        assert!(!is_error_reply("normal text"));
    }
}
