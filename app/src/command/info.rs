use palaver_config::Config;

/// Strategy for displaying configuration information.
///
/// Outputs the loaded configuration with every secret masked: the bot and
/// webhook tokens, the four provider keys, and the search and transcription
/// credentials.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== palaver Configuration ===\n");

        println!("Telegram:");
        println!("  Token: {}", mask_key(&config.telegram.bot_token));
        println!("  Webhook URL: {}", config.telegram.webhook_url);
        println!("  Webhook Token: {}", mask_key(&config.telegram.webhook_token));
        println!("  API Base: {}", config.telegram.api_base);
        println!("  Bind: {}", config.telegram.bind);
        println!();

        println!("Providers:");
        println!("  OpenRouter: {}", mask_key(&config.providers.openrouter.api_key));
        println!("  DeepSeek: {}", mask_key(&config.providers.deepseek.api_key));
        println!("  Grok: {}", mask_key(&config.providers.grok.api_key));
        println!("  Gemini: {}", mask_key(&config.providers.gemini.api_key));
        println!();

        println!("Search:");
        if config.search.api_key.is_empty() || config.search.cx.is_empty() {
            println!("  Status: disabled (api_key or cx not set)");
        } else {
            println!("  API Key: {}", mask_key(&config.search.api_key));
            println!("  CX: {}", config.search.cx);
        }
        println!();

        println!("Transcription:");
        println!("  Base URL: {}", config.transcription.base_url);
        println!("  Model: {}", config.transcription.model);
        println!("  API Key: {}", mask_key(&config.transcription.api_key));
        if let Some(ref language) = config.transcription.language {
            println!("  Language: {language}");
        }

        Ok(())
    }
}

/// Keys are ASCII; byte slicing cannot split a character.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        "(not set)".to_string()
    } else if key.len() > 8 {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***".to_string()
    }
}
