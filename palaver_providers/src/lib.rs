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

//! Provider family adapters behind the `ChatBackend` trait.
//!
//! Four upstream conventions share one uniform reply shape: OpenRouter
//! (raw `chat/completions` with a reasoning budget and per-turn cache
//! hints), DeepSeek (system prompt folded into an opening exchange), Grok
//! and Gemini (OpenAI-compatible endpoints). Image generation, balance
//! queries and search-intent optimization ride the same clients.

mod balance;
mod compat;
mod deepseek;
mod error;
mod gemini;
mod grok;
mod intent;
mod openrouter;
mod registry;
pub mod retry;
mod turns;

pub use balance::{BalanceClient, DeepSeekBalance};
pub use deepseek::DeepSeekBackend;
pub use error::{Error, Result};
pub use gemini::GeminiBackend;
pub use grok::{GeneratedImage, GrokBackend};
pub use intent::optimize_search_intent;
pub use openrouter::OpenRouterBackend;
pub use registry::{ProviderKeys, ProviderRegistry};
pub use turns::wants_cache;
