#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use crate::command::CommandStrategy;
use palaver_config::Config;
use palaver_telegram::Gateway;
use tracing::info;

/// Strategy for running the webhook server.
pub struct ServeStrategy;

impl CommandStrategy for ServeStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        info!("Loaded config from ~/palaver/config.json");

        if config.telegram.bot_token.is_empty() {
            anyhow::bail!("Telegram bot token not configured. Set \"telegram.bot_token\" in config");
        }
        if config.telegram.webhook_url.is_empty() {
            anyhow::bail!("Webhook URL not configured. Set \"telegram.webhook_url\" in config");
        }
        if config.telegram.webhook_token.is_empty() {
            anyhow::bail!(
                "Webhook token not configured. Set \"telegram.webhook_token\" in config"
            );
        }

        let gateway = Gateway::new(&config);

        info!("Telegram bot is running. Press Ctrl+C to stop.");
        gateway.run().await?;

        Ok(())
    }
}
