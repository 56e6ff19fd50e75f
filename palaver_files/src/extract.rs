//! Local text extraction for the formats parsed without a model call.

use std::io::{Cursor, Read};

use tracing::error;
use zip::ZipArchive;

/// Replaces the whole body of a plain-text file that exceeds the cap.
pub const TRUNCATION_NOTICE: &str = "[内容过长，已截断]";

const MAX_TEXT_CHARS: usize = 10_000;

/// UTF-8 text files, capped. Oversized files come back as the truncation
/// notice only, never partial content.
pub fn plain_text(bytes: &[u8]) -> Option<String> {
    let content = match String::from_utf8(bytes.to_vec()) {
        Ok(content) => content,
        Err(e) => {
            error!("Text file is not valid UTF-8: {e}");
            return None;
        }
    };
    if content.chars().count() > MAX_TEXT_CHARS {
        return Some(TRUNCATION_NOTICE.to_string());
    }
    Some(content)
}

pub fn pdf_text(bytes: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("PDF extraction failed: {e}");
            None
        }
    }
}

/// DOCX body text: every `w:t` run inside `word/document.xml`, one `<br>`
/// per paragraph.
pub fn docx_text(bytes: &[u8]) -> Option<String> {
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            error!("DOCX is not a readable archive: {e}");
            return None;
        }
    };
    let mut xml = String::new();
    match archive.by_name("word/document.xml") {
        Ok(mut file) => {
            if let Err(e) = file.read_to_string(&mut xml) {
                error!("DOCX document.xml unreadable: {e}");
                return None;
            }
        }
        Err(e) => {
            error!("DOCX has no document.xml: {e}");
            return None;
        }
    }

    let mut text = String::new();
    for chunk in xml.split("</w:p>") {
        // The tail after the last paragraph holds section properties, not
        // prose; `<w:pgSz>` must not count as a paragraph opener.
        if !(chunk.contains("<w:p>") || chunk.contains("<w:p ")) {
            continue;
        }
        collect_runs(chunk, &mut text);
        text.push_str("<br>");
    }
    Some(text)
}

fn collect_runs(chunk: &str, out: &mut String) {
    let mut rest = chunk;
    while let Some(start) = rest.find("<w:t") {
        rest = &rest[start + 4..];
        // Accept `<w:t>` and `<w:t xml:space=...>`, skip `<w:tab/>` etc.
        let Some(first) = rest.chars().next() else {
            return;
        };
        if first != '>' && first != ' ' {
            continue;
        }
        let Some(open_end) = rest.find('>') else {
            return;
        };
        if rest[..open_end].ends_with('/') {
            rest = &rest[open_end + 1..];
            continue;
        }
        let body = &rest[open_end + 1..];
        let Some(end) = body.find("</w:t>") else {
            return;
        };
        out.push_str(&decode_xml_entities(&body[..end]));
        rest = &body[end + "</w:t>".len()..];
    }
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
