//! The webhook surface: one POST route, token-gated, with process-lifetime
//! update deduplication in front of the dispatcher.

use crate::bot::Gateway;
use crate::handler;
use crate::types::Update;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Deserialize)]
struct AuthParams {
    token: Option<String>,
}

pub(crate) fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/webhook", post(receive_update))
        .with_state(gateway)
}

/// Accepts one update from the platform. Replies 403 on a bad token,
/// 500 on a body that does not parse, and "OK" for everything else,
/// including duplicates.
async fn receive_update(
    State(gateway): State<Arc<Gateway>>,
    Query(params): Query<AuthParams>,
    body: String,
) -> (StatusCode, &'static str) {
    if !token_accepted(params.token.as_deref(), &gateway.webhook_token) {
        warn!("Webhook token verification failed");
        return (StatusCode::FORBIDDEN, "Forbidden: Invalid or missing token");
    }
    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            error!("Error processing request: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };
    info!("[REQUEST] Received update: {}", update.update_id);
    if !gateway.store.mark_processed(update.update_id).await {
        info!("[INFO] Update {} already processed, skipping", update.update_id);
        return (StatusCode::OK, "OK");
    }
    handler::handle_update(&gateway, update).await;
    (StatusCode::OK, "OK")
}

/// A request passes only with a non-empty token equal to the configured
/// secret. An empty configured secret therefore rejects everything.
fn token_accepted(received: Option<&str>, expected: &str) -> bool {
    received.is_some_and(|token| !token.is_empty() && token == expected)
}
