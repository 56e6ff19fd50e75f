//! Splitting long replies at the Telegram message limit.
//!
//! Cuts prefer paragraph and sentence boundaries, never land inside a
//! `<...>` span, and keep complete `<pre>` blocks in one chunk when they
//! fit. Tags open at a cut are closed at the chunk end and reopened at the
//! start of the next chunk, so every emitted chunk parses on its own.

use crate::balance::{is_balanced, repair};
use crate::is_supported;
use crate::scan::{Token, scan};

/// Hard Telegram per-message character limit.
pub const TELEGRAM_MAX_CHARS: usize = 4096;

/// Cut points in descending priority; the first one present in the window
/// wins, at its last occurrence.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "? ", "! ", "; ", ", "];

fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the `n`th character boundary, clamped to the end.
fn byte_at_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte offset just past the last word character in `window`.
fn last_word_end(window: &str) -> Option<usize> {
    window
        .char_indices()
        .rev()
        .find(|(_, c)| is_word_char(*c))
        .map(|(i, c)| i + c.len_utf8())
}

/// Pick a cut offset within `window`. `remaining` extends past the window
/// and is consulted so a cut never lands inside a tag span.
fn choose_cut(window: &str, remaining: &str) -> usize {
    let mut cut = SEPARATORS
        .iter()
        .find_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
        .or_else(|| last_word_end(window))
        .unwrap_or_else(|| byte_at_char(window, (char_count(window) * 4 / 5).max(1)));

    if let Some(lt) = window[..cut].rfind('<') {
        if let Some(gt) = remaining[lt..].find('>') {
            if lt + gt >= cut && lt > 0 {
                cut = lt;
            }
        }
    }
    cut.max(1)
}

/// Track which supported tags are open after consuming `piece`. Closing tags
/// only pop when they match the top of the stack; the repair pass deals with
/// anything messier.
fn update_open_tags(stack: &mut Vec<String>, piece: &str) {
    for token in scan(piece) {
        let Token::Tag(tag) = token else { continue };
        let name = tag.name.to_lowercase();
        if !is_supported(&name) {
            continue;
        }
        if tag.closing {
            if stack.last() == Some(&name) {
                stack.pop();
            }
        } else {
            stack.push(name);
        }
    }
}

fn closer_chars(stack: &[String]) -> usize {
    stack.iter().map(|t| char_count(t) + 3).sum()
}

/// Close every open tag, emit the chunk, and seed the next chunk with the
/// same tags reopened.
fn emit_chunk(
    parts: &mut Vec<String>,
    current: &mut String,
    open_tags: &[String],
    max_chars: usize,
) {
    for tag in open_tags.iter().rev() {
        current.push_str("</");
        current.push_str(tag);
        current.push('>');
    }
    parts.push(std::mem::take(current));
    for tag in open_tags {
        current.push('<');
        current.push_str(tag);
        current.push('>');
    }
    // Degenerate nesting could make the reopen prefix alone exceed the
    // budget; dropping it keeps the loop live and repair closes the rest.
    if char_count(current) >= max_chars {
        current.clear();
    }
}

/// Split `text` into chunks of at most `max_chars` characters, each one
/// independently parseable as Telegram HTML.
#[must_use]
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || char_count(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut parts: Vec<String> = Vec::new();
    let mut open_tags: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let used = char_count(&current);
        let budget = max_chars.saturating_sub(used).max(1);

        if char_count(remaining) <= budget {
            update_open_tags(&mut open_tags, remaining);
            current.push_str(remaining);
            break;
        }

        let window_end = byte_at_char(remaining, budget);
        let window = &remaining[..window_end];

        if let Some(pre_start) = window.find("<pre>") {
            if let Some(rel) = remaining[pre_start..].find("</pre>") {
                let block_end = pre_start + rel + "</pre>".len();
                if used + char_count(&remaining[..block_end]) <= max_chars {
                    let piece = &remaining[..block_end];
                    update_open_tags(&mut open_tags, piece);
                    current.push_str(piece);
                    remaining = &remaining[block_end..];
                    continue;
                }
                // The block fits a chunk of its own, so flush the text
                // before it and let the block lead the next chunk.
                if pre_start > 0 && char_count(&remaining[pre_start..block_end]) <= max_chars {
                    let piece = &remaining[..pre_start];
                    update_open_tags(&mut open_tags, piece);
                    current.push_str(piece);
                    remaining = &remaining[pre_start..];
                    emit_chunk(&mut parts, &mut current, &open_tags, max_chars);
                    continue;
                }
            }
        }

        let mut cut = choose_cut(window, remaining);
        let mut trial = open_tags.clone();
        update_open_tags(&mut trial, &remaining[..cut]);
        let closers = closer_chars(&trial);
        if used + char_count(&remaining[..cut]) + closers > max_chars && closers < budget {
            let shrunk_end = byte_at_char(remaining, budget - closers);
            cut = choose_cut(&remaining[..shrunk_end], remaining).min(cut);
        }

        let piece = &remaining[..cut];
        remaining = &remaining[cut..];
        update_open_tags(&mut open_tags, piece);
        current.push_str(piece);
        emit_chunk(&mut parts, &mut current, &open_tags, max_chars);
    }

    if !current.is_empty() {
        for tag in open_tags.iter().rev() {
            current.push_str("</");
            current.push_str(tag);
            current.push('>');
        }
        parts.push(current);
    }

    let mut final_parts = Vec::new();
    for part in parts {
        let part = if is_balanced(&part) {
            part
        } else {
            repair(&part)
        };
        if char_count(&part) > max_chars {
            let sub = split_message(&part, max_chars);
            if sub.first() == Some(&part) {
                final_parts.push(part);
            } else {
                final_parts.extend(sub);
            }
        } else {
            final_parts.push(part);
        }
    }
    final_parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::strip_tags;

    fn assert_chunks_sound(parts: &[String], max_chars: usize) {
        for part in parts {
            assert!(
                char_count(part) <= max_chars,
                "chunk over limit ({} > {max_chars}): {part:?}",
                char_count(part)
            );
            assert!(is_balanced(part), "unbalanced chunk: {part:?}");
            if let Some(lt) = part.rfind('<') {
                assert!(
                    part[lt..].contains('>'),
                    "chunk ends inside a tag: {part:?}"
                );
            }
        }
    }

    #[test]
    fn test_split_short_text_passthrough() {
        assert_eq!(split_message("hello", 100), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_prefers_blank_line() {
        let parts = split_message("aaaa aaaa.\n\nbbbb bbbb.", 15);
        assert_eq!(parts, vec!["aaaa aaaa.\n\n".to_string(), "bbbb bbbb.".to_string()]);
    }

    #[test]
    fn test_split_falls_back_to_sentence() {
        let parts = split_message("Rust is fun. Python is ok. Go exists.", 20);
        assert_eq!(
            parts,
            vec![
                "Rust is fun. ".to_string(),
                "Python is ok. ".to_string(),
                "Go exists.".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_closes_and_reopens_tags() {
        let text = format!("<b>{}</b>", "x".repeat(17));
        let parts = split_message(&text, 20);
        assert_eq!(
            parts,
            vec![
                format!("<b>{}</b>", "x".repeat(13)),
                format!("<b>{}</b>", "x".repeat(4)),
            ]
        );
        assert_chunks_sound(&parts, 20);
    }

    #[test]
    fn test_split_keeps_pre_block_whole() {
        let pre = "<pre>line1\nline2</pre>";
        let text = format!("intro text here\n{pre}\nmore trailing words");
        let parts = split_message(&text, 30);
        assert!(
            parts.iter().any(|p| p.contains(pre)),
            "pre block was broken: {parts:?}"
        );
        assert_chunks_sound(&parts, 30);
    }

    #[test]
    fn test_split_never_cuts_inside_tag() {
        let text = "aaaa bbbb <a href=\"https://e.com/pppp\">x</a> tail words here";
        let parts = split_message(text, 40);
        assert_eq!(parts[0], "aaaa bbbb ");
        assert_chunks_sound(&parts, 40);
    }

    #[test]
    fn test_split_preserves_visible_text() {
        let text = format!("<b>alpha beta. gamma</b> delta\n\n<i>{}</i>", "y".repeat(40));
        let parts = split_message(&text, 25);
        assert_chunks_sound(&parts, 25);
        let joined: String = parts.iter().map(|p| strip_tags(p)).collect();
        assert_eq!(joined, strip_tags(&text));
    }

    #[test]
    fn test_split_word_boundary_fallback() {
        // No separators anywhere; the cut lands after the last word run.
        let parts = split_message("wordwordword&&&&&&&&tail", 16);
        assert_eq!(
            parts,
            vec!["wordwordword".to_string(), "&&&&&&&&tail".to_string()]
        );
    }

    #[test]
    fn test_split_cjk_text() {
        let text = "这是一个很长的句子没有分隔符".repeat(3);
        let parts = split_message(&text, 16);
        assert_chunks_sound(&parts, 16);
        let joined: String = parts.concat();
        assert_eq!(joined, text);
    }
}
