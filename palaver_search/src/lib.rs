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

//! Web search for models without a built-in search capability.
//!
//! [`SearchClient`] queries Google Custom Search, fetches the top result
//! pages with rotating user agents, reduces each page to cleaned body text
//! and formats everything into one block the model can analyze. The
//! surface never errors: outages come back as `⚠️` notices in the result
//! string, and a query that exhausts its retries disables the engine until
//! restart.

mod extract;
mod google;

pub use google::SearchClient;
