//! Account balance queries for the paid providers.

use crate::Result;
use reqwest::Client;
use serde_json::Value;
use tracing::error;

const DEEPSEEK_BALANCE_URL: &str = "https://api.deepseek.com/user/balance";
const OPENROUTER_KEY_URL: &str = "https://openrouter.ai/api/v1/auth/key";

/// DeepSeek account standing as the API reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepSeekBalance {
    pub total: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct BalanceClient {
    http: Client,
    deepseek_key: String,
    openrouter_key: String,
}

impl BalanceClient {
    #[must_use]
    pub fn new(deepseek_key: String, openrouter_key: String) -> Self {
        Self {
            http: Client::new(),
            deepseek_key,
            openrouter_key,
        }
    }

    async fn fetch(&self, url: &str, key: &str) -> Result<Value> {
        Ok(self
            .http
            .get(url)
            .header("Accept", "application/json")
            .bearer_auth(key)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?)
    }

    /// Remaining DeepSeek balance, or `None` when the query fails.
    pub async fn deepseek(&self) -> Option<DeepSeekBalance> {
        match self.fetch(DEEPSEEK_BALANCE_URL, &self.deepseek_key).await {
            Ok(data) => {
                let balance = parse_deepseek_balance(&data);
                if balance.is_none() {
                    error!("DeepSeek balance response missing balance_infos");
                }
                balance
            }
            Err(e) => {
                error!("DeepSeek balance query failed: {e}");
                None
            }
        }
    }

    /// Remaining OpenRouter credit in USD, or `None` when the query fails.
    /// A null limit on a valid key reads as zero.
    pub async fn openrouter(&self) -> Option<f64> {
        match self.fetch(OPENROUTER_KEY_URL, &self.openrouter_key).await {
            Ok(data) => Some(parse_openrouter_credit(&data)),
            Err(e) => {
                error!("OpenRouter balance query failed: {e}");
                None
            }
        }
    }
}

fn parse_deepseek_balance(data: &Value) -> Option<DeepSeekBalance> {
    let info = &data["balance_infos"][0];
    Some(DeepSeekBalance {
        total: info["total_balance"].as_str()?.to_string(),
        currency: info["currency"].as_str()?.to_string(),
    })
}

fn parse_openrouter_credit(data: &Value) -> f64 {
    data["data"]["limit_remaining"].as_f64().unwrap_or(0.0)
}
