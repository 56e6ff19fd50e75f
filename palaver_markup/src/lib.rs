#![warn(
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

//! Telegram-HTML markup handling for model output.
//!
//! Model replies arrive as untrusted text that mixes prose, Markdown code
//! fences and a small whitelist of Telegram HTML tags. This crate turns that
//! text into something `parse_mode=HTML` will accept:
//!
//! - [`escape`] neutralizes everything except the supported tags
//! - [`is_balanced`] / [`repair`] / [`sanitize`] form an escalation ladder
//!   for broken tag structure (none of them can fail)
//! - [`split_message`] cuts long replies at the Telegram length limit while
//!   keeping every chunk well-formed
//! - [`render`] assembles the final reply (reasoning section, usage bar)

mod balance;
mod escape;
pub mod render;
mod scan;
mod split;

pub use balance::{is_balanced, repair, sanitize, strip_tags};
pub use escape::{escape, escape_pre_interiors};
pub use split::{TELEGRAM_MAX_CHARS, split_message};

/// Tag names Telegram accepts in `parse_mode=HTML` messages.
pub const SUPPORTED_TAGS: &[&str] = &[
    "b",
    "strong",
    "i",
    "em",
    "u",
    "ins",
    "s",
    "strike",
    "del",
    "a",
    "code",
    "pre",
    "tg-spoiler",
    "blockquote",
];

pub(crate) fn is_supported(name: &str) -> bool {
    SUPPORTED_TAGS.contains(&name)
}
