//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Two call shapes are exposed: [`LlmProvider::complete`] for free text and
//! [`LlmProvider::extract`] for schema-constrained extraction. Provider
//! instances are shared immutable capabilities; clone them freely.

pub mod providers;

use std::fmt;

use thiserror::Error;

use crate::schema::{ExtractionSchema, Payload, SchemaError};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider request timed out: {0}")]
    Timeout(String),
    #[error("provider returned unparseable output: {0}")]
    InvalidOutput(String),
    #[error("extraction violates schema: {0}")]
    Schema(#[from] SchemaError),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

// ── Model identity ────────────────────────────────────────────────────────────

/// Which model answers, and how it is named to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIdentity {
    model: String,
    display_name: Option<String>,
}

impl ModelIdentity {
    pub fn new(model: impl Into<String>, display_name: Option<String>) -> Self {
        Self { model: model.into(), display_name }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured display name, else one derived from the model id.
    ///
    /// The bare `GigaChat` id is the Lite tier and is shown as such.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        match self.model.as_str() {
            "GigaChat" => "GigaChat Lite".to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait` dependency.
/// Adding a backend = new module + new variant + new match arms.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// One completion round-trip: `system` prompt plus the user's text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(system, user).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(system, user).await,
        }
    }

    /// Schema-constrained extraction. The returned payload holds every
    /// schema field, `null` where the model had no answer.
    pub async fn extract(
        &self,
        system: &str,
        user: &str,
        schema: &ExtractionSchema,
    ) -> Result<Payload, ProviderError> {
        let raw = match self {
            LlmProvider::Dummy(p) => p.extract(system, user, schema).await?,
            LlmProvider::OpenAiCompatible(p) => p.extract(system, user, schema).await?,
        };
        Ok(schema.conform(raw)?)
    }

    pub fn identity(&self) -> &ModelIdentity {
        match self {
            LlmProvider::Dummy(p) => p.identity(),
            LlmProvider::OpenAiCompatible(p) => p.identity(),
        }
    }
}
