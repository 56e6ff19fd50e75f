//! Gateway assembly: builds every client from one loaded config and runs
//! the webhook server.

use crate::client::TelegramClient;
use crate::error::Result;
use crate::outbox::Outbox;
use crate::webhook;
use palaver_config::Config;
use palaver_conversation::ContextStore;
use palaver_files::{FileGateway, TranscriptionClient};
use palaver_providers::{BalanceClient, ProviderKeys, ProviderRegistry};
use palaver_search::SearchClient;
use std::sync::Arc;
use tracing::{error, info};

/// One running bot instance. Shared across request handlers behind an
/// `Arc`; all per-chat state lives in the store.
pub struct Gateway {
    pub(crate) client: TelegramClient,
    pub(crate) outbox: Outbox,
    pub(crate) store: ContextStore,
    pub(crate) providers: ProviderRegistry,
    pub(crate) balances: BalanceClient,
    pub(crate) search: SearchClient,
    pub(crate) files: FileGateway,
    pub(crate) transcriber: TranscriptionClient,
    pub(crate) webhook_token: String,
    webhook_url: String,
    bind: String,
}

impl Gateway {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let client = TelegramClient::new(&config.telegram.bot_token, &config.telegram.api_base);
        let outbox = Outbox::new(client.clone());
        let providers = ProviderRegistry::new(ProviderKeys {
            openrouter: config.providers.openrouter.api_key.clone(),
            deepseek: config.providers.deepseek.api_key.clone(),
            grok: config.providers.grok.api_key.clone(),
            gemini: config.providers.gemini.api_key.clone(),
        });
        Self {
            client,
            outbox,
            store: ContextStore::new(),
            providers,
            balances: BalanceClient::new(
                config.providers.deepseek.api_key.clone(),
                config.providers.openrouter.api_key.clone(),
            ),
            search: SearchClient::new(config.search.api_key.clone(), config.search.cx.clone()),
            files: FileGateway::new(
                config.telegram.bot_token.clone(),
                config.telegram.api_base.clone(),
            ),
            transcriber: TranscriptionClient::new(
                config.transcription.base_url.clone(),
                config.transcription.api_key.clone(),
                config.transcription.model.clone(),
                config.transcription.language.clone(),
            ),
            webhook_token: config.telegram.webhook_token.clone(),
            webhook_url: config.telegram.webhook_url.clone(),
            bind: config.telegram.bind.clone(),
        }
    }

    /// Registers this instance's webhook with the platform. Startup
    /// continues either way; a failed registration only means no updates
    /// arrive until it is fixed.
    async fn register_webhook(&self) {
        let url = registration_url(&self.webhook_url, &self.webhook_token);
        match self.client.set_webhook(&url).await {
            Ok(()) => info!("[INIT] Webhook configured successfully"),
            Err(e) => error!("[ERROR] Webhook setup failed: {e}"),
        }
    }

    /// Registers the webhook, then serves until the process is stopped.
    pub async fn run(self) -> Result<()> {
        self.register_webhook().await;
        let bind = self.bind.clone();
        let listener = tokio::net::TcpListener::bind(&bind).await?;
        info!("Listening on {bind}");
        axum::serve(listener, webhook::router(Arc::new(self))).await?;
        Ok(())
    }
}

/// The registered URL carries the shared secret as a query parameter; the
/// webhook route checks it on every request.
fn registration_url(webhook_url: &str, token: &str) -> String {
    format!("{webhook_url}?token={token}")
}
