//! Webhook HTTP server.
//!
//! `POST /api/webhook` receives Telegram updates. The endpoint always
//! acknowledges with 200: Telegram redelivers on any other status, and a
//! retry storm helps nobody. Requests failing the secret-token check and
//! bodies that do not parse are acknowledged and dropped.
//!
//! The sibling management endpoints mirror the Telegram-side webhook state:
//! set, delete, status, plus a simple health probe.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use subtle::ConstantTimeEq;
use teloxide::payloads::SetWebhookSetters as _;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, Update};
use tokio::net::TcpListener;

use crate::core::config;
use crate::telegram::handlers::{route_update, HandlerDeps};

/// Path Telegram delivers updates to.
pub const WEBHOOK_PATH: &str = "/api/webhook";

const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Update kinds the conversation flow consumes.
const ALLOWED_UPDATES: [AllowedUpdate; 4] = [
    AllowedUpdate::Message,
    AllowedUpdate::EditedMessage,
    AllowedUpdate::ChannelPost,
    AllowedUpdate::CallbackQuery,
];

/// Shared state for the webhook server.
#[derive(Clone)]
struct WebhookState {
    bot: Bot,
    deps: HandlerDeps,
}

/// Start the webhook HTTP server.
pub async fn run_webhook_server(bot: Bot, deps: HandlerDeps, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = create_webhook_router(bot, deps);

    log::info!("Starting webhook server on http://{}", addr);
    log::info!("  POST {WEBHOOK_PATH}         - Telegram updates");
    log::info!("  POST {WEBHOOK_PATH}/set     - register webhook with Telegram");
    log::info!("  POST {WEBHOOK_PATH}/delete  - remove webhook from Telegram");
    log::info!("  GET  {WEBHOOK_PATH}/status  - webhook status");
    log::info!("  GET  {WEBHOOK_PATH}/health  - health probe");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the webhook router; split out so tests can drive it in-process.
pub fn create_webhook_router(bot: Bot, deps: HandlerDeps) -> Router {
    let state = WebhookState { bot, deps };

    Router::new()
        .route(WEBHOOK_PATH, post(webhook_handler))
        .route("/api/webhook/set", post(set_webhook_handler))
        .route("/api/webhook/delete", post(delete_webhook_handler))
        .route("/api/webhook/status", get(webhook_status_handler))
        .route("/api/webhook/health", get(health_handler))
        .with_state(state)
}

/// POST /api/webhook — one Telegram update per request.
async fn webhook_handler(State(state): State<WebhookState>, headers: HeaderMap, body: String) -> StatusCode {
    if !secret_token_matches(&headers) {
        log::warn!("Webhook request with missing or invalid secret token; dropping");
        return StatusCode::OK;
    }

    let update: Update = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            log::warn!("Failed to parse webhook update: {}", e);
            return StatusCode::OK;
        }
    };

    // route_update never errors; handler failures are logged inside so the
    // acknowledgment below is unconditional
    route_update(&state.bot, update, &state.deps).await;

    StatusCode::OK
}

/// Constant-time comparison of the secret-token header.
///
/// With no secret configured every request passes.
fn secret_token_matches(headers: &HeaderMap) -> bool {
    let Some(expected) = config::WEBHOOK_SECRET_TOKEN.as_deref() else {
        return true;
    };

    let received = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    expected.as_bytes().ct_eq(received.as_bytes()).into()
}

/// Registers the webhook with Telegram and returns the public URL.
pub async fn set_webhook(bot: &Bot) -> anyhow::Result<String> {
    let Some(base) = config::WEBHOOK_URL.as_deref() else {
        return Err(anyhow::anyhow!("WEBHOOK_URL environment variable not set"));
    };

    let webhook_url = format!("{}{}", base.trim_end_matches('/'), WEBHOOK_PATH);
    let parsed = url::Url::parse(&webhook_url)?;

    let mut request = bot
        .set_webhook(parsed)
        .drop_pending_updates(true)
        .allowed_updates(ALLOWED_UPDATES.to_vec());
    if let Some(secret) = config::WEBHOOK_SECRET_TOKEN.clone() {
        request = request.secret_token(secret);
    }
    request.await?;

    log::info!("Webhook set to {}", webhook_url);
    Ok(webhook_url)
}

/// POST /api/webhook/set
async fn set_webhook_handler(State(state): State<WebhookState>) -> (StatusCode, Json<Value>) {
    match set_webhook(&state.bot).await {
        Ok(webhook_url) => (
            StatusCode::OK,
            Json(json!({ "success": true, "webhook_url": webhook_url })),
        ),
        Err(e) => {
            log::error!("Failed to set webhook: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": e.to_string() })),
            )
        }
    }
}

/// POST /api/webhook/delete
async fn delete_webhook_handler(State(state): State<WebhookState>) -> (StatusCode, Json<Value>) {
    use teloxide::payloads::DeleteWebhookSetters as _;

    match state.bot.delete_webhook().drop_pending_updates(true).await {
        Ok(_) => {
            log::info!("Webhook deleted");
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(e) => {
            log::error!("Failed to delete webhook: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": e.to_string() })),
            )
        }
    }
}

/// GET /api/webhook/status
async fn webhook_status_handler(State(state): State<WebhookState>) -> (StatusCode, Json<Value>) {
    match state.bot.get_webhook_info().await {
        Ok(info) => {
            let url = info.url.as_ref().map(|u| u.to_string()).unwrap_or_default();
            (
                StatusCode::OK,
                Json(json!({
                    "is_set": !url.is_empty(),
                    "url": url,
                    "pending_update_count": info.pending_update_count,
                    "last_error_message": info.last_error_message,
                })),
            )
        }
        Err(e) => {
            log::error!("Failed to get webhook info: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": e.to_string() })),
            )
        }
    }
}

/// GET /api/webhook/health
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "knopka",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
