//! JSON configuration loaded from `~/palaver/config.json`.

pub mod schema;

pub use schema::{
    Config, ProviderConfig, ProvidersConfig, SearchConfig, TelegramConfig, TranscriptionConfig,
};
