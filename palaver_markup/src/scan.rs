//! Tag token scanner shared by the escape/balance/split passes.
//!
//! A tag-like span is `<`, an optional `/`, a name (word characters with at
//! most one `-` segment, so `tg-spoiler` parses as one name), then either `>`
//! directly or whitespace-led attributes that may span lines but cannot
//! contain `>`. Anything that does not fit this shape stays literal text.

/// One recognized `<...>` span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagToken<'a> {
    /// The full span including the angle brackets.
    pub raw: &'a str,
    pub name: &'a str,
    /// Attribute text including its leading whitespace, `""` when absent.
    pub attrs: &'a str,
    pub closing: bool,
    /// True when the raw span ends in `/>`, e.g. `<br />`.
    pub self_closing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Tag(TagToken<'a>),
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte length of a tag name at the start of `s`, or `None` if no name there.
fn name_len(s: &str) -> Option<usize> {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        if is_name_char(c) {
            len = i + c.len_utf8();
        } else {
            break;
        }
    }
    if len == 0 {
        return None;
    }
    // Allow one hyphenated segment (tg-spoiler).
    if let Some(rest) = s[len..].strip_prefix('-') {
        let mut extra = 0;
        for (i, c) in rest.char_indices() {
            if is_name_char(c) {
                extra = i + c.len_utf8();
            } else {
                break;
            }
        }
        if extra > 0 {
            len += 1 + extra;
        }
    }
    Some(len)
}

/// Parse a tag starting at the first byte of `text`, which must be `<`.
fn parse_tag(text: &str) -> Option<TagToken<'_>> {
    let body_start = if text[1..].starts_with('/') { 2 } else { 1 };
    let closing = body_start == 2;
    let after_slash = &text[body_start..];
    let n_len = name_len(after_slash)?;
    let name = &after_slash[..n_len];
    let after_name = &after_slash[n_len..];

    if after_name.starts_with('>') {
        let raw = &text[..body_start + n_len + 1];
        return Some(TagToken {
            raw,
            name,
            attrs: "",
            closing,
            self_closing: false,
        });
    }
    // Attributes must begin with whitespace, so `<b/>` is not a tag.
    if !after_name.chars().next()?.is_whitespace() {
        return None;
    }
    let gt = after_name.find('>')?;
    let attrs = &after_name[..gt];
    let raw = &text[..body_start + n_len + gt + 1];
    Some(TagToken {
        raw,
        name,
        attrs,
        closing,
        self_closing: raw.ends_with("/>"),
    })
}

/// Tokenize `text` into literal runs and tag spans, left to right.
pub(crate) fn scan(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    let mut text_from = 0;
    while let Some(offset) = text[cursor..].find('<') {
        let lt = cursor + offset;
        if let Some(tag) = parse_tag(&text[lt..]) {
            if lt > text_from {
                tokens.push(Token::Text(&text[text_from..lt]));
            }
            let end = lt + tag.raw.len();
            tokens.push(Token::Tag(tag));
            cursor = end;
            text_from = end;
        } else {
            cursor = lt + 1;
        }
    }
    if text_from < text.len() {
        tokens.push(Token::Text(&text[text_from..]));
    }
    tokens
}

/// A region of text relative to literal `<pre>...</pre>` spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Span<'a> {
    /// A complete `<pre>...</pre>` block, kept opaque by the passes.
    Pre(&'a str),
    Outside(&'a str),
}

/// Split `text` around complete preformatted blocks. Only the bare `<pre>`
/// form counts; an unterminated `<pre>` leaves the rest as outside text.
pub(crate) fn split_pre(text: &str) -> Vec<Span<'_>> {
    let mut spans = Vec::new();
    let mut rest = text;
    let mut base = 0;
    while let Some(start) = text[base..].find("<pre>") {
        let open = base + start;
        let Some(close) = text[open..].find("</pre>") else {
            break;
        };
        let end = open + close + "</pre>".len();
        if open > base {
            spans.push(Span::Outside(&text[base..open]));
        }
        spans.push(Span::Pre(&text[open..end]));
        base = end;
        rest = &text[end..];
    }
    if !rest.is_empty() || spans.is_empty() {
        spans.push(Span::Outside(rest));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag<'a>(tokens: &'a [Token<'a>], idx: usize) -> &'a TagToken<'a> {
        match &tokens[idx] {
            Token::Tag(t) => t,
            Token::Text(t) => panic!("expected tag at {idx}, got text {t:?}"),
        }
    }

    #[test]
    fn test_scan_plain_text() {
        let tokens = scan("hello world");
        assert_eq!(tokens, vec![Token::Text("hello world")]);
    }

    #[test]
    fn test_scan_simple_pair() {
        let tokens = scan("<b>bold</b>");
        assert_eq!(tokens.len(), 3);
        let open = tag(&tokens, 0);
        assert_eq!(open.name, "b");
        assert!(!open.closing);
        assert_eq!(tokens[1], Token::Text("bold"));
        let close = tag(&tokens, 2);
        assert_eq!(close.name, "b");
        assert!(close.closing);
    }

    #[test]
    fn test_scan_anchor_attrs() {
        let tokens = scan(r#"<a href="https://example.com">link</a>"#);
        let open = tag(&tokens, 0);
        assert_eq!(open.name, "a");
        assert_eq!(open.attrs, r#" href="https://example.com""#);
    }

    #[test]
    fn test_scan_hyphenated_name() {
        let tokens = scan("<tg-spoiler>boo</tg-spoiler>");
        assert_eq!(tag(&tokens, 0).name, "tg-spoiler");
        assert_eq!(tag(&tokens, 2).name, "tg-spoiler");
    }

    #[test]
    fn test_scan_self_closing_needs_space() {
        // `<br/>` has no whitespace before the slash, so it is literal text.
        assert_eq!(scan("<br/>"), vec![Token::Text("<br/>")]);
        let tokens = scan("<br />");
        assert!(tag(&tokens, 0).self_closing);
    }

    #[test]
    fn test_scan_lone_angle_is_text() {
        assert_eq!(scan("a < b and <> c"), vec![Token::Text("a < b and <> c")]);
    }

    #[test]
    fn test_scan_multiline_attrs() {
        let tokens = scan("<a href=\"x\"\n>t</a>");
        assert_eq!(tag(&tokens, 0).attrs, " href=\"x\"\n");
    }

    #[test]
    fn test_split_pre_basic() {
        let spans = split_pre("before<pre>let x = 1;</pre>after");
        assert_eq!(
            spans,
            vec![
                Span::Outside("before"),
                Span::Pre("<pre>let x = 1;</pre>"),
                Span::Outside("after"),
            ]
        );
    }

    #[test]
    fn test_split_pre_unterminated() {
        let spans = split_pre("<pre>never closed");
        assert_eq!(spans, vec![Span::Outside("<pre>never closed")]);
    }

    #[test]
    fn test_split_pre_keeps_inner_tags_opaque() {
        let spans = split_pre("<pre><b>not a real tag</pre>");
        assert_eq!(spans, vec![Span::Pre("<pre><b>not a real tag</pre>")]);
    }
}
