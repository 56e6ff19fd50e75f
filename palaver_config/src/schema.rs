use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Public URL Telegram posts updates to; the webhook token is appended
    /// as a query parameter at registration time.
    pub webhook_url: String,
    pub webhook_token: String,
    #[serde(default = "TelegramConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "TelegramConfig::default_bind")]
    pub bind: String,
}

impl TelegramConfig {
    fn default_api_base() -> String {
        "https://api.telegram.org".to_string()
    }

    fn default_bind() -> String {
        "0.0.0.0:5000".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub grok: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
}

/// Google Custom Search credentials. Empty credentials leave search
/// disabled rather than failing startup.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub cx: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscriptionConfig {
    #[serde(default = "TranscriptionConfig::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "TranscriptionConfig::default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            api_key: String::new(),
            model: Self::default_model(),
            language: None,
        }
    }
}

impl TranscriptionConfig {
    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_model() -> String {
        "whisper-1".to_string()
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("palaver");

        let config_path = config_dir.join("config.json");

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'palaver init-config' to create it.",
                config_path.display()
            );
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_json::from_str(&content)?;

        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join("palaver");

        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    pub fn create_config() -> anyhow::Result<()> {
        let config_dir = Self::ensure_config_dir()?;
        let config_path = config_dir.join("config.json");

        if config_path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                config_path.display()
            );
        }

        let config_template = r#"{
  "telegram": {
    "bot_token": "your-telegram-bot-token-here",
    "webhook_url": "https://your.domain/webhook",
    "webhook_token": "your-webhook-token-here"
  },
  "providers": {
    "openrouter": { "api_key": "your-openrouter-api-key-here" },
    "deepseek": { "api_key": "your-deepseek-api-key-here" },
    "grok": { "api_key": "your-xai-api-key-here" },
    "gemini": { "api_key": "your-gemini-api-key-here" }
  },
  "search": {
    "api_key": "your-google-cse-api-key-here",
    "cx": "your-google-cse-cx-here"
  },
  "transcription": {
    "base_url": "https://api.openai.com/v1",
    "api_key": "your-transcription-api-key-here",
    "model": "whisper-1"
  }
}"#;

        std::fs::write(&config_path, config_template)?;

        println!("✅ Created config file at: {}", config_path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Add your Telegram bot token and a webhook token of your choosing");
        println!("   2. Fill in the provider API keys you plan to use");
        println!("   3. Run 'palaver serve' to register the webhook and start serving");
        println!();
        println!("🔧 Configuration options:");
        println!("   - telegram.api_base: Bot API host (for local test servers)");
        println!("   - telegram.bind: listen address, default 0.0.0.0:5000");
        println!("   - search: Google Custom Search credentials; empty disables /search");
        println!("   - transcription: speech-to-text endpoint for voice messages");
        println!();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let json = r#"{
            "telegram": {
                "bot_token": "123:ABC",
                "webhook_url": "https://bot.example/webhook",
                "webhook_token": "sekrit"
            },
            "providers": {
                "grok": { "api_key": "xai-key" }
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.telegram.bind, "0.0.0.0:5000");
        assert_eq!(config.providers.grok.api_key, "xai-key");
        assert_eq!(config.providers.openrouter.api_key, "");
        assert_eq!(config.search.api_key, "");
        assert_eq!(config.transcription.base_url, "https://api.openai.com/v1");
        assert_eq!(config.transcription.model, "whisper-1");
        assert_eq!(config.transcription.language, None);
    }

    #[test]
    fn test_missing_telegram_section_is_an_error() {
        let json = r#"{ "providers": {} }"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }
}
