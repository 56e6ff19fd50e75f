//! Plain-text harvesting from fetched pages.
//!
//! Search hits are fed to the model, not rendered, so the extractor is a
//! deliberately simple scanner: drop the boilerplate containers, cut the
//! remaining markup at block boundaries, and keep the first handful of
//! paragraph-sized chunks that look like prose.

use std::sync::OnceLock;

use regex::Regex;

/// Containers whose contents never belong in a search summary.
const STRIPPED_CONTAINERS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "form",
];

/// Tags treated as paragraph boundaries once containers are gone.
const BLOCK_CLOSERS: &[&str] = &[
    "</p>", "</div>", "</h1>", "</h2>", "</h3>", "</h4>", "</h5>", "</h6>", "<br>", "<br/>",
    "<br />",
];

/// Navigation chrome that survives container stripping on CJK portals.
const SKIP_HINTS: &[&str] = &["跳转", "导航", "关注", "直播", "上一页", "下一页"];

/// Punctuation that counts as a safe truncation boundary in CJK prose.
const BREAK_PUNCTUATION: &str = "。！？；，、";

const MIN_PARAGRAPH_CHARS: usize = 20;
const MAX_PARAGRAPHS: usize = 10;

pub(crate) const NO_BODY_TEXT: &str = "未找到正文内容";

static ANY_TAG: OnceLock<Regex> = OnceLock::new();
static AD_FILLER: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn any_tag() -> &'static Regex {
    ANY_TAG.get_or_init(|| {
        Regex::new(r"<[^>]*>").expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn ad_filler() -> &'static Regex {
    AD_FILLER.get_or_init(|| {
        Regex::new("广告|Sponsored|推荐|热门").expect("Static regex pattern is guaranteed to be valid")
    })
}

#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn whitespace_run() -> &'static Regex {
    WHITESPACE_RUN
        .get_or_init(|| Regex::new(r"\s+").expect("Static regex pattern is guaranteed to be valid"))
}

/// Extracts readable body text from raw HTML.
///
/// Returns [`NO_BODY_TEXT`] when nothing paragraph-like survives the
/// filters; callers treat that as valid (if unhelpful) content.
pub(crate) fn extract_main_text(html: &str) -> String {
    let mut body = html.to_string();
    for tag in STRIPPED_CONTAINERS {
        body = remove_elements(&body, tag);
    }

    // Source newlines are layout, not structure. Flatten them first so
    // only block boundaries produce paragraph breaks.
    body = body.replace(['\r', '\n'], " ");
    for closer in BLOCK_CLOSERS {
        body = body.replace(closer, "\n");
    }
    let body = any_tag().replace_all(&body, "");
    let body = decode_entities(&body);

    let mut paragraphs = Vec::new();
    for chunk in body.split('\n') {
        let text = chunk.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() < MIN_PARAGRAPH_CHARS {
            continue;
        }
        if SKIP_HINTS.iter().any(|hint| text.contains(hint)) {
            continue;
        }
        paragraphs.push(text);
        if paragraphs.len() == MAX_PARAGRAPHS {
            break;
        }
    }

    if paragraphs.is_empty() {
        NO_BODY_TEXT.to_string()
    } else {
        paragraphs.join(" ")
    }
}

/// Removes `<tag ...>...</tag>` blocks wholesale, contents included.
///
/// Unclosed blocks are left alone; the opener is later stripped like any
/// other tag and only the text leaks through.
fn remove_elements(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = html.to_string();
    let mut pos = 0;
    while pos < result.len() {
        let Some(idx) = result[pos..].find(&open) else {
            break;
        };
        let start = pos + idx;
        let after_name = start + open.len();

        // `<nav` must not swallow `<navigation-widget>`.
        let opens_element = result[after_name..]
            .chars()
            .next()
            .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace());
        if !opens_element {
            pos = after_name;
            continue;
        }

        if let Some(end_idx) = result[start..].find(&close) {
            result.replace_range(start..start + end_idx + close.len(), " ");
            pos = start;
        } else {
            pos = after_name;
        }
    }
    result
}

/// Minimal entity decoding for the handful that dominate page text.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Scrubs filler phrases and whitespace runs, then truncates to
/// `max_chars` without cutting mid-sentence.
///
/// The backward scan stops at the first ASCII character or CJK
/// punctuation mark; the boundary character itself is dropped and `...`
/// appended. Purely ideographic text with no boundary gets a hard cut.
pub(crate) fn clean_content(text: &str, max_chars: usize) -> String {
    let text = ad_filler().replace_all(text, "");
    let text = whitespace_run().replace_all(&text, " ");
    let text = text.trim();

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }

    let mut cut = max_chars.min(chars.len() - 1);
    for i in (1..=cut).rev() {
        if chars[i].is_ascii() || BREAK_PUNCTUATION.contains(chars[i]) {
            cut = i;
            break;
        }
    }
    let mut truncated: String = chars[..cut].iter().collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{NO_BODY_TEXT, clean_content, extract_main_text, remove_elements};

    #[test]
    fn test_extract_drops_stripped_containers() {
        let html = "<html><head><style>.a{color:red}</style></head><body>\
                    <nav>首页 新闻 体育 娱乐 财经 科技 汽车 房产 导航栏目</nav>\
                    <p>这是一段足够长的正文内容，讲述了今天发生的重要新闻事件。</p>\
                    <script>var tracker = loadAnalytics();</script>\
                    </body></html>";
        let text = extract_main_text(html);
        assert!(text.contains("重要新闻事件"));
        assert!(!text.contains("tracker"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains("首页"));
    }

    #[test]
    fn test_extract_filters_short_and_navigation_chunks() {
        let html = "<div>短文本</div>\
                    <div>点击这里跳转到移动版页面继续阅读全文内容详情</div>\
                    <div>正文第一段内容在这里，长度超过二十个字符的门槛要求。</div>";
        let text = extract_main_text(html);
        assert_eq!(text, "正文第一段内容在这里，长度超过二十个字符的门槛要求。");
    }

    #[test]
    fn test_extract_caps_paragraph_count() {
        let mut html = String::new();
        for i in 0..12 {
            html.push_str(&format!(
                "<p>第{i}段正文内容，为了超过二十个字符的长度门槛而特意写长。</p>"
            ));
        }
        let text = extract_main_text(&html);
        assert!(text.contains("第9段"));
        assert!(!text.contains("第10段"));
    }

    #[test]
    fn test_extract_without_prose_reports_no_body() {
        let html = "<html><body><p>太短</p><div><img src='x.png'></div></body></html>";
        assert_eq!(extract_main_text(html), NO_BODY_TEXT);
    }

    #[test]
    fn test_extract_decodes_common_entities() {
        let html = "<p>Research shows A &amp; B outperform C &lt;baseline&gt; by far.</p>";
        let text = extract_main_text(html);
        assert!(text.contains("A & B"));
        assert!(text.contains("<baseline>"));
    }

    #[test]
    fn test_remove_elements_spares_longer_tag_names() {
        let html = "<navigation-widget>keep me around</navigation-widget><nav>drop me</nav>";
        let cleaned = remove_elements(html, "nav");
        assert!(cleaned.contains("keep me around"));
        assert!(!cleaned.contains("drop me"));
    }

    #[test]
    fn test_clean_content_scrubs_filler_and_whitespace() {
        let cleaned = clean_content("广告  today's   headline  推荐", 100);
        assert_eq!(cleaned, "today's headline");
    }

    #[test]
    fn test_clean_content_short_text_untouched() {
        assert_eq!(clean_content("简短标题", 80), "简短标题");
    }

    #[test]
    fn test_clean_content_truncates_at_cjk_punctuation() {
        // Boundary mark at index 10; the scan from index 15 walks back to
        // it, drops it, and appends the ellipsis.
        let text = "一二三四五六七八九十。甲乙丙丁戊己庚辛壬癸";
        assert_eq!(clean_content(text, 15), "一二三四五六七八九十...");
    }

    #[test]
    fn test_clean_content_hard_cut_without_boundary() {
        let text = "一二三四五六七八九十甲乙丙丁戊己庚辛壬癸";
        assert_eq!(clean_content(text, 10), "一二三四五六七八九十...");
    }
}
