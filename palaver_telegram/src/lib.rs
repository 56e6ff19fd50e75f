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

//! Telegram-facing surface of the bot: the webhook server, update
//! dispatch, outbound delivery, and the response pipeline that glues the
//! sibling crates together.

mod attach;
mod bot;
mod client;
mod command;
mod error;
mod handler;
mod outbox;
mod pipeline;
mod request;
mod types;
mod webhook;

pub use bot::Gateway;
pub use error::{Error, Result};
