//! Google Custom Search plus per-result page fetching.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use palaver_providers::retry::retry_with_backoff;
use reqwest::Client;
use reqwest::header;
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use crate::extract::{clean_content, extract_main_text};

const CSE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Content farms and login-walled portals that waste a result slot.
const EXCLUDED_DOMAINS: &[&str] = &[
    "csdn.net",
    "blog.csdn.net",
    "zhihu.com",
    "www.zhihu.com",
    "baidu.com",
    "m.baidu.com",
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const QUERY_TIMEOUT: Duration = Duration::from_secs(15);
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Seconds slept between query attempts (two attempts total).
const QUERY_BACKOFF: &[u64] = &[1];
/// Seconds slept between page-fetch attempts (three attempts total).
const FETCH_BACKOFF: &[u64] = &[1, 2];

/// Cap on cleaned page text kept per result.
const PAGE_CONTENT_CHARS: usize = 5000;
const TITLE_CHARS: usize = 80;
const PREVIEW_CHARS: usize = 500;

const NO_ENGINE: &str = "⚠️ 无可用搜索引擎服务";
const ALL_ENGINES_DOWN: &str = "⚠️ 所有搜索引擎服务不可用";
const NO_RESULTS: &str = "⚠️ Google 未找到相关结果";
const RESULTS_HEADER: &str = "🔍 <b>Google搜索结果</b><br><br>";

#[derive(Debug)]
struct SearchHit {
    title: String,
    link: String,
    content: String,
}

/// Web search collaborator for models without built-in search.
///
/// One query fans out into per-result page fetches; everything the model
/// sees comes back as a single formatted string, failure notices included.
/// A query that fails past its retries disables the engine for the rest of
/// the process lifetime.
pub struct SearchClient {
    http: Client,
    api_key: String,
    cx: String,
    enabled: AtomicBool,
    agent_cursor: AtomicUsize,
}

impl SearchClient {
    /// Missing credentials leave the engine disabled from the start.
    #[must_use]
    pub fn new(api_key: String, cx: String) -> Self {
        let configured = !api_key.is_empty() && !cx.is_empty();
        Self {
            http: Client::new(),
            api_key,
            cx,
            enabled: AtomicBool::new(configured),
            agent_cursor: AtomicUsize::new(0),
        }
    }

    /// Runs a search and returns the formatted result block.
    ///
    /// Never fails: engine-down and empty-result conditions come back as
    /// `⚠️`-prefixed notices the model can relay.
    pub async fn search(&self, query: &str, num_results: usize) -> String {
        if !self.enabled.load(Ordering::Relaxed) {
            return NO_ENGINE.to_string();
        }

        let hits = match retry_with_backoff(|| self.query_cse(query), QUERY_BACKOFF).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("Search query failed, disabling the engine: {e}");
                self.enabled.store(false, Ordering::Relaxed);
                return ALL_ENGINES_DOWN.to_string();
            }
        };

        let mut valid = Vec::new();
        for mut hit in hits {
            if valid.len() >= num_results {
                break;
            }
            info!("Fetching content: {}", hit.link);
            if let Some(content) = self.fetch_page_text(&hit.link).await {
                hit.content = content;
                valid.push(hit);
            }
        }
        if valid.len() < num_results {
            warn!(
                "Only {} of {num_results} requested results were usable",
                valid.len()
            );
        }
        format_results(&valid)
    }

    async fn query_cse(&self, query: &str) -> reqwest::Result<Vec<SearchHit>> {
        let response = self
            .http
            .get(CSE_ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", query),
                ("num", "10"),
                ("lr", "lang_zh-CN"),
                ("safe", "active"),
            ])
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let data: Value = response.json().await?;
        Ok(process_hits(&data))
    }

    /// Fetches one result page and reduces it to cleaned body text.
    ///
    /// `None` covers every failure mode; the caller just moves on to the
    /// next hit.
    async fn fetch_page_text(&self, url: &str) -> Option<String> {
        let agent = self.next_agent();
        match retry_with_backoff(|| self.fetch_once(url, agent), FETCH_BACKOFF).await {
            Ok(html) => Some(clean_content(&extract_main_text(&html), PAGE_CONTENT_CHARS)),
            Err(e) => {
                error!("Giving up on {url}: {e}");
                None
            }
        }
    }

    async fn fetch_once(&self, url: &str, agent: &'static str) -> reqwest::Result<String> {
        self.http
            .get(url)
            .header(header::USER_AGENT, agent)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    // One agent per page, rotated across pages.
    fn next_agent(&self) -> &'static str {
        let idx = self.agent_cursor.fetch_add(1, Ordering::Relaxed) % USER_AGENTS.len();
        USER_AGENTS[idx]
    }
}

/// Pulls title/link pairs out of the CSE response, dropping excluded
/// domains. Hits with no link survive here and die at fetch time.
fn process_hits(data: &Value) -> Vec<SearchHit> {
    let Some(items) = data["items"].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let link = item["link"].as_str().unwrap_or_default();
            if is_excluded_url(link) {
                return None;
            }
            Some(SearchHit {
                title: item["title"].as_str().unwrap_or("无标题").to_string(),
                link: link.to_string(),
                content: String::new(),
            })
        })
        .collect()
}

fn is_excluded_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .is_some_and(|host| EXCLUDED_DOMAINS.iter().any(|excluded| host.contains(excluded))),
        Err(e) => {
            warn!("URL parse failed for {url}: {e}");
            false
        }
    }
}

fn format_results(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }
    let mut summary = String::from(RESULTS_HEADER);
    for (i, hit) in hits.iter().enumerate() {
        let title = clean_content(&hit.title, TITLE_CHARS);
        let preview: String = hit.content.chars().take(PREVIEW_CHARS).collect();
        summary.push_str(&format!(
            "{}. <b>{title}</b><br>▸ 内容: {preview}...<br>🌐 <a href=\"{}\">来源</a><br><br>",
            i + 1,
            hit.link
        ));
    }
    summary
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        NO_RESULTS, RESULTS_HEADER, SearchClient, SearchHit, format_results, is_excluded_url,
        process_hits,
    };

    #[test]
    fn test_excluded_url_matches_subdomains() {
        assert!(is_excluded_url("https://blog.csdn.net/user/article"));
        assert!(is_excluded_url("https://www.zhihu.com/question/1"));
        assert!(is_excluded_url("https://tieba.baidu.com/p/2"));
        assert!(!is_excluded_url("https://news.example.com/story"));
    }

    #[test]
    fn test_unparseable_url_is_not_excluded() {
        assert!(!is_excluded_url("not a url"));
        assert!(!is_excluded_url(""));
    }

    #[test]
    fn test_process_hits_filters_and_defaults() {
        let data = json!({
            "items": [
                {"title": "Kept story", "link": "https://news.example.com/a"},
                {"title": "Farmed copy", "link": "https://blog.csdn.net/b"},
                {"link": "https://example.org/untitled"},
            ]
        });
        let hits = process_hits(&data);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Kept story");
        assert_eq!(hits[1].title, "无标题");
        assert_eq!(hits[1].link, "https://example.org/untitled");
    }

    #[test]
    fn test_process_hits_without_items() {
        assert!(process_hits(&json!({"searchInformation": {}})).is_empty());
    }

    #[test]
    fn test_format_results_shape() {
        let hits = vec![
            SearchHit {
                title: "今日要闻".to_string(),
                link: "https://news.example.com/a".to_string(),
                content: "正文摘要内容".to_string(),
            },
            SearchHit {
                title: "第二条".to_string(),
                link: "https://news.example.com/b".to_string(),
                content: "另一段正文".to_string(),
            },
        ];
        let block = format_results(&hits);
        assert!(block.starts_with(RESULTS_HEADER));
        assert!(block.contains("1. <b>今日要闻</b><br>▸ 内容: 正文摘要内容...<br>"));
        assert!(block.contains("🌐 <a href=\"https://news.example.com/b\">来源</a><br><br>"));
        assert!(block.contains("2. <b>第二条</b>"));
    }

    #[test]
    fn test_format_results_empty() {
        assert_eq!(format_results(&[]), NO_RESULTS);
    }

    #[test]
    fn test_format_results_truncates_preview() {
        let hits = vec![SearchHit {
            title: "Long".to_string(),
            link: "https://example.com".to_string(),
            content: "x".repeat(600),
        }];
        let block = format_results(&hits);
        assert!(block.contains(&format!("▸ 内容: {}...", "x".repeat(500))));
        assert!(!block.contains(&"x".repeat(501)));
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_no_engine() {
        let client = SearchClient::new(String::new(), String::new());
        let reply = client.search("任意查询", 3).await;
        assert_eq!(reply, "⚠️ 无可用搜索引擎服务");
    }

    #[test]
    fn test_agent_rotation_cycles() {
        let client = SearchClient::new("key".to_string(), "cx".to_string());
        let first = client.next_agent();
        let second = client.next_agent();
        let third = client.next_agent();
        let fourth = client.next_agent();
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert_eq!(first, fourth);
    }
}
