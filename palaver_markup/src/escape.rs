//! Entity escaping that keeps the supported tag whitelist live.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::is_supported;
use crate::scan::{Span, split_pre};

static ANCHOR: OnceLock<Regex> = OnceLock::new();
static ENTITY_TAG: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn anchor() -> &'static Regex {
    ANCHOR.get_or_init(|| {
        Regex::new(r#"(?i)<a\s+href="([^"]+)"\s*>([^<]+)</a>"#)
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn entity_tag() -> &'static Regex {
    ENTITY_TAG.get_or_init(|| {
        Regex::new(r"&lt;(/?)(\w+(?:-\w+)?)(\s+[^&]*?)?&gt;")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

fn escape_entities(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape a run of text, then bring the supported tags the escape just
/// neutralized back to life. Tag names are lowercased on the way back.
fn escape_and_restore(text: &str) -> String {
    let escaped = escape_entities(text);
    entity_tag()
        .replace_all(&escaped, |caps: &Captures<'_>| {
            let name = caps[2].to_lowercase();
            if is_supported(&name) {
                let slash = &caps[1];
                let attrs = caps.get(3).map_or("", |m| m.as_str());
                format!("<{slash}{name}{attrs}>")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Escape one region outside any `<pre>` block, preserving well-formed
/// anchors whose href and label get entity-escaped in place.
fn escape_outside(chunk: &str, out: &mut String) {
    let mut last = 0;
    for caps in anchor().captures_iter(chunk) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_and_restore(&chunk[last..whole.start()]));
        out.push_str("<a href=\"");
        out.push_str(&escape_entities(&caps[1]));
        out.push_str("\">");
        out.push_str(&escape_entities(&caps[2]));
        out.push_str("</a>");
        last = whole.end();
    }
    out.push_str(&escape_and_restore(&chunk[last..]));
}

/// Escape HTML special characters while keeping supported Telegram tags and
/// the interiors of complete `<pre>` blocks untouched.
#[must_use]
pub fn escape(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut out = String::with_capacity(text.len() + 16);
    for span in split_pre(text) {
        match span {
            Span::Pre(block) => out.push_str(block),
            Span::Outside(chunk) => escape_outside(chunk, &mut out),
        }
    }
    out
}

/// Re-escape the interior of every complete `<pre>` block, leaving the text
/// outside untouched. Stored replies run through this so code spans cannot
/// smuggle live markup back into later prompt turns.
#[must_use]
pub fn escape_pre_interiors(text: &str) -> String {
    if !text.contains("<pre>") {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 16);
    for span in split_pre(text) {
        match span {
            Span::Pre(block) => {
                let inner = &block["<pre>".len()..block.len() - "</pre>".len()];
                out.push_str("<pre>");
                out.push_str(&escape(inner));
                out.push_str("</pre>");
            }
            Span::Outside(chunk) => out.push_str(chunk),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_special_chars() {
        assert_eq!(escape("1 < 2 && 3 > 2"), "1 &lt; 2 &amp;&amp; 3 &gt; 2");
    }

    #[test]
    fn test_escape_keeps_supported_tags() {
        assert_eq!(escape("a <b>bold</b> & done"), "a <b>bold</b> &amp; done");
        assert_eq!(
            escape("<tg-spoiler>secret</tg-spoiler>"),
            "<tg-spoiler>secret</tg-spoiler>"
        );
    }

    #[test]
    fn test_escape_neutralizes_unsupported_tags() {
        assert_eq!(
            escape("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_escape_lowercases_restored_names() {
        assert_eq!(escape("<B>loud</B>"), "<b>loud</b>");
    }

    #[test]
    fn test_escape_preserves_pre_interior() {
        let text = "<pre>if a < b && c > d {}</pre>";
        assert_eq!(escape(text), text);
    }

    #[test]
    fn test_escape_anchor_href_and_label() {
        let out = escape(r#"see <a href="https://x.dev/?a=1&b=2">a & b</a>"#);
        assert_eq!(
            out,
            r#"see <a href="https://x.dev/?a=1&amp;b=2">a &amp; b</a>"#
        );
    }

    #[test]
    fn test_escape_keeps_bare_anchor() {
        // Whitelist restore is by name only; href enforcement happens in
        // sanitize, not here.
        assert_eq!(escape("<a>naked</a>"), "<a>naked</a>");
    }

    #[test]
    fn test_escape_empty() {
        assert_eq!(escape(""), "");
    }

    #[test]
    fn test_escape_idempotent_for_supported_markup() {
        let text = "plain <i>and</i> <code>x + y</code>";
        let once = escape(text);
        assert_eq!(escape(&once), once);
    }

    #[test]
    fn test_escape_pre_interiors_only_touches_blocks() {
        let out = escape_pre_interiors("a < b <pre>if a < b {}</pre> c < d");
        assert_eq!(out, "a < b <pre>if a &lt; b {}</pre> c < d");
    }

    #[test]
    fn test_escape_pre_interiors_keeps_supported_tags_inside() {
        let text = "<pre><b>hi</b> & bye</pre>";
        assert_eq!(escape_pre_interiors(text), "<pre><b>hi</b> &amp; bye</pre>");
    }

    #[test]
    fn test_escape_pre_interiors_without_blocks() {
        assert_eq!(escape_pre_interiors("1 < 2"), "1 < 2");
    }
}
