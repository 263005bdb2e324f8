//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! All OpenAI wire types are private to this module; callers never see
//! them. Extraction uses `response_format = json_schema`; backends that
//! ignore the contract and answer with fenced or prose-wrapped JSON are
//! tolerated by [`parse_json_object`].

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::llm::{ModelIdentity, ProviderError};
use crate::schema::ExtractionSchema;

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Constructed once at startup, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    identity: ModelIdentity,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        identity: ModelIdentity,
        temperature: f32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, identity, temperature, api_key })
    }

    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    /// One round-trip; returns the trimmed assistant text, which may be
    /// empty when the model answered with no content.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let payload = self.request(system, user, None);
        self.send(&payload).await
    }

    /// Schema-constrained round-trip; returns the raw JSON object as the
    /// model produced it. Conformance is checked by the caller.
    pub async fn extract(
        &self,
        system: &str,
        user: &str,
        schema: &ExtractionSchema,
    ) -> Result<Value, ProviderError> {
        let system = format!("{}\n\nПоля для заполнения:\n{}", system.trim(), schema.field_docs());
        let format = ResponseFormat {
            kind: "json_schema",
            json_schema: JsonSchemaFormat {
                name: schema.name().to_string(),
                schema: schema.to_json_schema(),
                strict: false,
            },
        };
        let payload = self.request(&system, user, Some(format));
        let text = self.send(&payload).await?;
        parse_json_object(&text)
    }

    fn request(&self, system: &str, user: &str, response_format: Option<ResponseFormat>) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(Message { role: "system".to_string(), content: system.to_string() });
        }
        messages.push(Message { role: "user".to_string(), content: user.to_string() });

        ChatCompletionRequest {
            model: self.identity.model().to_string(),
            messages,
            temperature: self.temperature,
            response_format,
        }
    }

    async fn send(&self, payload: &ChatCompletionRequest) -> Result<String, ProviderError> {
        debug!(
            model = %payload.model,
            structured = payload.response_format.is_some(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
            ProviderError::from(e)
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        debug!(choices = parsed.choices.len(), "received LLM response");

        answer_text(parsed)
    }
}

/// Trimmed content of the first choice. A null or blank content is an empty
/// answer; a response without choices is an error.
fn answer_text(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Request("no choices in response".into()))?;
    Ok(choice.message.content.as_deref().map(str::trim).unwrap_or_default().to_string())
}

/// Decode the JSON object in a model answer, stripping Markdown fences and
/// any prose around the outermost braces.
pub(crate) fn parse_json_object(text: &str) -> Result<Value, ProviderError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&unfenced[start..=end])
            .map_err(|e| ProviderError::InvalidOutput(format!("{e}: {unfenced}"))),
        _ => Err(ProviderError::InvalidOutput(format!("no JSON object in: {unfenced}"))),
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: String,
    schema: Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<Value>,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}
