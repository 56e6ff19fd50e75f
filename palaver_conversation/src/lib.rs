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

//! Per-chat conversation state for the gateway.
//!
//! A single [`ContextStore`] owns every chat's bounded turn log, mode flags
//! and model/persona selections, plus the cross-chat tables for grouped
//! photo uploads and webhook update dedup. One mutex serializes all
//! mutation; completion calls and other slow network I/O happen outside it.
//!
//! Turn content is normalized on the way in: reasoning preambles are
//! stripped down to the final answer and code-block interiors are
//! re-escaped, so the log only ever holds flattened, prompt-safe text.

mod context;
mod history;
mod store;

pub use context::{ChatContext, RolePrompt, UiTimer};
pub use history::{HistoryLimits, StoredTurn, TurnLog};
pub use store::{ContextStore, PendingPhoto, PromptSnapshot};
