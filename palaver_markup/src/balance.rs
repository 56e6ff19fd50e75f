//! Tag-structure checks and the two repair passes.
//!
//! `repair` is the gentle pass: it trusts the text and only synthesizes the
//! closing tags needed to rebalance the supported vocabulary. `sanitize` is
//! the harsher pass used when repair was not enough: unsupported tags are
//! neutralized, href-less anchors are neutralized, stray closing tags are
//! dropped. Neither pass can fail.

use std::sync::OnceLock;

use regex::Regex;

use crate::is_supported;
use crate::scan::{Span, Token, scan, split_pre};

static DOUBLED_PRE_CLOSE: OnceLock<Regex> = OnceLock::new();
static BR_TAG: OnceLock<Regex> = OnceLock::new();
static HREF_ATTR: OnceLock<Regex> = OnceLock::new();
static ANY_TAG: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn doubled_pre_close() -> &'static Regex {
    DOUBLED_PRE_CLOSE.get_or_init(|| {
        Regex::new(r"</pre>\s*</pre>").expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn br_tag() -> &'static Regex {
    BR_TAG.get_or_init(|| {
        Regex::new(r"<br\s*/?>").expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn href_attr() -> &'static Regex {
    HREF_ATTR.get_or_init(|| {
        Regex::new(r#"\s+href="[^"]+""#).expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn any_tag() -> &'static Regex {
    ANY_TAG.get_or_init(|| {
        Regex::new(r"<[^>]*>").expect("Static regex pattern is guaranteed to be valid")
    })
}

/// Check whether every tag-like span closes in the right order. Tracks all
/// tag names, not just the supported whitelist; `.../>` spans are ignored.
#[must_use]
pub fn is_balanced(text: &str) -> bool {
    let mut stack: Vec<&str> = Vec::new();
    for token in scan(text) {
        let Token::Tag(tag) = token else { continue };
        if tag.self_closing {
            continue;
        }
        if tag.closing {
            if stack.last() != Some(&tag.name) {
                return false;
            }
            stack.pop();
        } else {
            stack.push(tag.name);
        }
    }
    stack.is_empty()
}

/// Rebalance supported tags without losing any input text.
///
/// A closing tag that matches something deeper in the stack closes the tags
/// above it and reopens them after; a closing tag with no open partner passes
/// through verbatim. Unclosed tags are closed at the end, except `<code>`,
/// which Telegram tolerates unterminated.
#[must_use]
pub fn repair(text: &str) -> String {
    // Models habitually double the pre terminator.
    let text = doubled_pre_close().replace_all(text, "</pre>");
    let mut out = String::with_capacity(text.len() + 16);
    let mut stack: Vec<&str> = Vec::new();
    for token in scan(&text) {
        let tag = match token {
            Token::Text(t) => {
                out.push_str(t);
                continue;
            }
            Token::Tag(tag) => tag,
        };
        if !is_supported(tag.name) {
            out.push_str(tag.raw);
        } else if tag.closing {
            if stack.last() == Some(&tag.name) {
                stack.pop();
                out.push_str(tag.raw);
            } else if let Some(pos) = stack.iter().position(|t| *t == tag.name) {
                for inner in stack[pos + 1..].iter().rev() {
                    out.push_str("</");
                    out.push_str(inner);
                    out.push('>');
                }
                out.push_str(tag.raw);
                for inner in &stack[pos + 1..] {
                    out.push('<');
                    out.push_str(inner);
                    out.push('>');
                }
                stack.remove(pos);
            } else {
                out.push_str(tag.raw);
            }
        } else {
            out.push_str(tag.raw);
            stack.push(tag.name);
        }
    }
    for name in stack.iter().rev() {
        if *name != "code" {
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
    out
}

fn neutralize(raw: &str) -> String {
    raw.replace('<', "&lt;").replace('>', "&gt;")
}

fn sanitize_outside<'a>(chunk: &'a str, stack: &mut Vec<(&'a str, &'a str)>, out: &mut String) {
    for token in scan(chunk) {
        let tag = match token {
            Token::Text(t) => {
                out.push_str(t);
                continue;
            }
            Token::Tag(tag) => tag,
        };
        if !is_supported(tag.name) {
            out.push_str(&neutralize(tag.raw));
        } else if tag.closing {
            if stack.last().is_some_and(|(n, _)| *n == tag.name) {
                stack.pop();
                out.push_str(tag.raw);
            } else if let Some(pos) = stack.iter().position(|(n, _)| *n == tag.name) {
                for (inner, _) in stack[pos + 1..].iter().rev() {
                    out.push_str("</");
                    out.push_str(inner);
                    out.push('>');
                }
                out.push_str(tag.raw);
                for (inner, attrs) in &stack[pos + 1..] {
                    out.push('<');
                    out.push_str(inner);
                    out.push_str(attrs);
                    out.push('>');
                }
                stack.remove(pos);
            }
            // A closing tag with no open partner is dropped.
        } else if tag.name == "a" && !href_attr().is_match(tag.attrs) {
            out.push_str(&neutralize(tag.raw));
        } else {
            out.push_str(tag.raw);
            stack.push((tag.name, tag.attrs));
        }
    }
}

/// Force the text into a shape Telegram will parse, at the cost of dropping
/// or neutralizing markup that `repair` would have let through. `<br>`
/// variants become newlines and every open tag is closed at the end, `code`
/// included. Complete `<pre>` blocks stay untouched.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let text = br_tag().replace_all(text, "\n");
    let mut out = String::with_capacity(text.len() + 16);
    let mut stack: Vec<(&str, &str)> = Vec::new();
    for span in split_pre(&text) {
        match span {
            Span::Pre(block) => out.push_str(block),
            Span::Outside(chunk) => sanitize_outside(chunk, &mut stack, &mut out),
        }
    }
    for (name, _) in stack.iter().rev() {
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
    out
}

/// Drop all tag-like spans, turning `<br>` variants into newlines first.
/// Used for the plain-text fallback when HTML parsing is rejected.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    let text = text.replace("<br/>", "\n").replace("<br>", "\n");
    any_tag().replace_all(&text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_accepts_nesting() {
        assert!(is_balanced("<b><i>x</i></b>"));
        assert!(is_balanced("no tags at all"));
        assert!(is_balanced(""));
    }

    #[test]
    fn test_balanced_rejects_crossing_and_unclosed() {
        assert!(!is_balanced("<b><i>x</b></i>"));
        assert!(!is_balanced("<b>open"));
        assert!(!is_balanced("stray</b>"));
    }

    #[test]
    fn test_balanced_ignores_self_closing() {
        assert!(is_balanced("line<br />line"));
    }

    #[test]
    fn test_balanced_tracks_unsupported_names() {
        assert!(!is_balanced("<div>unclosed"));
    }

    #[test]
    fn test_repair_closes_unclosed_tags() {
        assert_eq!(repair("<b>bold"), "<b>bold</b>");
        assert_eq!(repair("<b><i>x"), "<b><i>x</i></b>");
    }

    #[test]
    fn test_repair_tolerates_unclosed_code() {
        assert_eq!(repair("<code>let x = 1;"), "<code>let x = 1;");
        assert_eq!(repair("<b><code>x"), "<b><code>x</b>");
    }

    #[test]
    fn test_repair_collapses_doubled_pre_close() {
        assert_eq!(repair("<pre>x</pre></pre>"), "<pre>x</pre>");
        assert_eq!(repair("<pre>x</pre>\n</pre>"), "<pre>x</pre>");
    }

    #[test]
    fn test_repair_mismatched_close_reopens_inner() {
        // </b> closes the <i> above it, then reopens it.
        assert_eq!(repair("<b><i>x</b>y</i>"), "<b><i>x</i></b><i>y</i>");
    }

    #[test]
    fn test_repair_keeps_stray_close() {
        assert_eq!(repair("text</b>"), "text</b>");
    }

    #[test]
    fn test_repair_leaves_unsupported_alone() {
        assert_eq!(repair("<div>x</div>"), "<div>x</div>");
    }

    #[test]
    fn test_repair_output_is_balanced() {
        for input in ["<b><i>a</b>", "<u>x<pre>y</pre></pre>", "<b>a<i>b<s>c"] {
            assert!(is_balanced(&repair(input)), "unbalanced after repair: {input}");
        }
    }

    #[test]
    fn test_sanitize_converts_br() {
        assert_eq!(sanitize("a<br>b<br/>c<br />d"), "a\nb\nc\nd");
    }

    #[test]
    fn test_sanitize_neutralizes_unsupported() {
        assert_eq!(sanitize("<div>x</div>"), "&lt;div&gt;x&lt;/div&gt;");
    }

    #[test]
    fn test_sanitize_drops_stray_close() {
        assert_eq!(sanitize("text</b>more"), "textmore");
    }

    #[test]
    fn test_sanitize_requires_anchor_href() {
        assert_eq!(sanitize("<a>x</a>"), "&lt;a&gt;x");
        let keep = r#"<a href="https://example.com">x</a>"#;
        assert_eq!(sanitize(keep), keep);
    }

    #[test]
    fn test_sanitize_closes_everything() {
        assert_eq!(sanitize("<b><code>x"), "<b><code>x</code></b>");
    }

    #[test]
    fn test_sanitize_reopens_with_attrs() {
        let input = r#"<b><a href="https://x.dev">t</b>u</a>"#;
        assert_eq!(
            sanitize(input),
            r#"<b><a href="https://x.dev">t</a></b><a href="https://x.dev">u</a>"#
        );
    }

    #[test]
    fn test_sanitize_preserves_pre_blocks() {
        let text = "<pre>a < b</pre>";
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<b>x</b><br>y"), "x\ny");
        assert_eq!(strip_tags("a <unknown attr=1> b"), "a  b");
    }
}
