//! Webhook channel. Receives Telegram updates over HTTP and replies through
//! the Bot API.
//!
//! ## URL layout
//!
//! ```text
//! POST /{secret}   Telegram update; 403 unless secret == bot token
//! GET  /health     liveness
//! ```
//!
//! The update is acknowledged immediately; each text message is handled in
//! its own task so a slow LLM or target API never holds up the webhook.

pub mod telegram;

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use teloxide::Bot;
use teloxide::types::{ChatId, Update, UpdateKind};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::dispatch::Dispatcher;
use crate::error::AppError;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state; cheap to clone.
#[derive(Clone)]
pub struct WebhookState {
    secret: Arc<str>,
    bot: Bot,
    dispatcher: Dispatcher,
}

impl WebhookState {
    pub fn new(token: &str, dispatcher: Dispatcher) -> Self {
        Self {
            secret: Arc::from(token),
            bot: Bot::new(token),
            dispatcher,
        }
    }

    /// Use a different Bot API endpoint, e.g. a local Bot API server.
    pub fn with_api_url(mut self, url: reqwest::Url) -> Self {
        self.bot = self.bot.set_api_url(url);
        self
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/{secret}", post(webhook))
        .with_state(state)
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn serve(bind_addr: &str, state: WebhookState, shutdown: CancellationToken) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("webhook bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "webhook listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("webhook server error: {e}")))?;

    info!("webhook shut down");
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /{secret}
async fn webhook(State(state): State<WebhookState>, Path(secret): Path<String>, body: Bytes) -> StatusCode {
    if secret != *state.secret {
        warn!("webhook called with wrong secret");
        return StatusCode::FORBIDDEN;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "undecodable update ignored");
            return StatusCode::OK;
        }
    };

    let UpdateKind::Message(message) = update.kind else {
        debug!(update_id = ?update.id, "non-message update ignored");
        return StatusCode::OK;
    };
    let Some(text) = message.text().map(str::to_string) else {
        debug!(update_id = ?update.id, "non-text message ignored");
        return StatusCode::OK;
    };

    let span = info_span!("update", update_id = ?update.id, chat_id = message.chat.id.0);
    tokio::spawn(handle_text(state, message.chat.id, text).instrument(span));

    StatusCode::OK
}

async fn handle_text(state: WebhookState, chat_id: ChatId, text: String) {
    debug!("text message received");
    let reply = state.dispatcher.respond(&text).await;
    telegram::send_reply(&state.bot, chat_id, reply).await;
}
