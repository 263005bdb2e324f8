//! Per-message pipeline: classify, route, handle, render.
//!
//! ```text
//! RECEIVED ─classify─▶ CLASSIFIED ─┬─ offtop / unknown ─▶ fallback reply
//!                                  └─ handler ─▶ extract ─▶ dispatch ─▶ render
//! ```
//!
//! Every call to [`Dispatcher::respond`] yields exactly one [`Reply`].
//! Failures are mapped to a user-facing message, never propagated further.

mod render;

pub use render::{RenderError, Reply, render};

use std::sync::Arc;

use teloxide::utils::html;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::handlers::{HandlerError, HandlerRegistry, TargetHandler};
use crate::llm::{LlmProvider, ProviderError};
use crate::prompt::{FALLBACK_TEMPLATE, PromptBuilder};
use crate::supervisor::{OFFTOP_SENTINEL, Supervisor};

const UNAVAILABLE_REPLY: &str = "Сервис временно недоступен, попробуйте позже.";
const NOT_UNDERSTOOD_REPLY: &str = "Не удалось понять запрос. Попробуйте сформулировать его иначе.";
/// Generic failure reply, also used when a reply cannot be delivered.
pub const FAILED_REPLY: &str = "Не удалось выполнить запрос. Попробуйте позже.";

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("classification failed: {0}")]
    Classification(#[source] ProviderError),
    #[error("handler `{handler}` could not extract a payload: {source}")]
    Extraction {
        handler: String,
        #[source]
        source: HandlerError,
    },
    #[error("handler `{handler}` call failed: {source}")]
    Dispatch {
        handler: String,
        #[source]
        source: HandlerError,
    },
    #[error("handler `{handler}` response could not be rendered: {source}")]
    Render {
        handler: String,
        #[source]
        source: RenderError,
    },
}

impl DispatchError {
    /// Reply text shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            DispatchError::Classification(_) => UNAVAILABLE_REPLY,
            DispatchError::Extraction { .. } => NOT_UNDERSTOOD_REPLY,
            DispatchError::Dispatch { .. } | DispatchError::Render { .. } => FAILED_REPLY,
        }
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Route<'a> {
    Offtop,
    Handler(&'a TargetHandler),
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Shared, read-only pipeline state. Clone freely into per-message tasks.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    supervisor: Arc<Supervisor>,
    llm: LlmProvider,
    http: reqwest::Client,
    fallback: Arc<str>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, llm: LlmProvider, http: reqwest::Client) -> Self {
        let supervisor = Arc::new(Supervisor::new(&registry));

        let header = PromptBuilder::template(FALLBACK_TEMPLATE)
            .var("model", html::escape(&llm.identity().display_name()))
            .build();
        let fallback = std::iter::once(header)
            .chain(registry.iter().map(|h| h.mission().to_string()))
            .collect::<Vec<_>>()
            .join("\n\n");
        let fallback = Arc::from(fallback);

        Self { registry, supervisor, llm, http, fallback }
    }

    /// Capability summary sent for offtop messages.
    pub fn fallback_answer(&self) -> &str {
        &self.fallback
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Map a classifier label to a route. Unknown labels are offtop.
    pub fn route(&self, label: &str) -> Route<'_> {
        if label == OFFTOP_SENTINEL {
            return Route::Offtop;
        }
        match self.registry.get(label) {
            Some(handler) => Route::Handler(handler),
            None => {
                warn!(%label, "classifier returned unknown label; treating as offtop");
                Route::Offtop
            }
        }
    }

    /// Run the whole pipeline for one message.
    pub async fn handle(&self, text: &str) -> Result<Reply, DispatchError> {
        let label = self
            .supervisor
            .classify(&self.llm, text)
            .await
            .map_err(DispatchError::Classification)?;

        let handler = match self.route(&label) {
            Route::Offtop => {
                info!("offtop message; sending capability summary");
                return Ok(Reply::Text(self.fallback.to_string()));
            }
            Route::Handler(handler) => handler,
        };

        let name = handler.name().to_string();
        info!(handler = %name, "routing message");

        let payload = handler
            .extract(&self.llm, text)
            .await
            .map_err(|source| DispatchError::Extraction { handler: name.clone(), source })?;

        let response = handler
            .dispatch(&self.http, &payload)
            .await
            .map_err(|source| DispatchError::Dispatch { handler: name.clone(), source })?;

        render(response).map_err(|source| DispatchError::Render { handler: name, source })
    }

    /// [`handle`](Self::handle), with failures turned into a reply.
    #[instrument(skip_all, fields(len = text.len()))]
    pub async fn respond(&self, text: &str) -> Reply {
        match self.handle(text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "message handling failed");
                Reply::Text(e.user_message().to_string())
            }
        }
    }
}
