//! Telegram file retrieval.

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error};

/// One downloaded file plus the Content-Type the CDN reported for it.
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Resolves `file_id`s against the Bot API and downloads the bytes.
///
/// Deliberately self-contained: attachment handling keeps its own HTTP
/// client instead of borrowing the messaging client.
pub struct FileGateway {
    http: Client,
    token: String,
    api_base: String,
}

impl FileGateway {
    #[must_use]
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        Self {
            http: Client::new(),
            token: token.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// `getFile`: maps a `file_id` to its server-side path.
    pub async fn resolve(&self, file_id: &str) -> Option<String> {
        let url = format!("{}/bot{}/getFile", self.api_base, self.token);
        let response = match self
            .http
            .get(&url)
            .query(&[("file_id", file_id)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("getFile request failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            error!("getFile returned {} for {file_id}", response.status());
            return None;
        }
        let data: Value = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                error!("getFile response unreadable: {e}");
                return None;
            }
        };
        if data["ok"].as_bool() != Some(true) {
            error!(
                "getFile rejected {file_id}: {}",
                data["description"].as_str().unwrap_or("unknown error")
            );
            return None;
        }
        data["result"]["file_path"].as_str().map(str::to_string)
    }

    /// Direct download URL for an already-resolved file path.
    #[must_use]
    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token)
    }

    /// Downloads a resolved path. `None` on any transport or status error.
    pub async fn fetch(&self, file_path: &str) -> Option<FetchedFile> {
        let url = self.file_url(file_path);
        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("File download failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            error!("File download returned {} for {file_path}", response.status());
            return None;
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        match response.bytes().await {
            Ok(bytes) => {
                debug!("Downloaded {} bytes for {file_path}", bytes.len());
                Some(FetchedFile {
                    bytes: bytes.to_vec(),
                    content_type,
                })
            }
            Err(e) => {
                error!("File body read failed: {e}");
                None
            }
        }
    }

    /// `resolve` + `fetch` in one step.
    pub async fn download(&self, file_id: &str) -> Option<FetchedFile> {
        let path = self.resolve(file_id).await?;
        self.fetch(&path).await
    }
}
