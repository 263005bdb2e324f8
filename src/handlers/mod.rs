//! Target handlers: the integrations a message can be routed to.
//!
//! A [`HandlerDescriptor`] is static configuration. The registry turns each
//! descriptor into a [`TargetHandler`], which exposes three capabilities:
//! [`describe`](TargetHandler::describe) for the classifier prompt,
//! [`extract`](TargetHandler::extract) to pull a typed payload out of free
//! text via the LLM, and [`dispatch`](TargetHandler::dispatch) to call the
//! target API with it.

pub mod catalog;
mod registry;

pub use registry::{HandlerRegistry, RegistryError};

use std::collections::HashSet;
use std::fmt;

use chrono::{Local, NaiveDate};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use teloxide::utils::html;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::llm::{LlmProvider, ProviderError};
use crate::prompt::EXTRACT_TEMPLATE;
use crate::schema::{DerivedField, ExtractionSchema, Payload, SchemaError};

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ProviderError),
    #[error("derived field failed: {0}")]
    Derived(#[from] SchemaError),
    #[error("target API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

// ── Descriptor types ──────────────────────────────────────────────────────────

/// A message and the label the classifier should give it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub message: String,
    pub label: String,
}

impl Example {
    pub fn new(message: impl Into<String>, label: impl Into<String>) -> Self {
        Self { message: message.into(), label: label.into() }
    }
}

impl fmt::Display for Example {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Сообщение: {}\nОтвет: {}", self.message, self.label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

impl From<HttpMethod> for Method {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Get => Method::GET,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Method::from(*self), f)
    }
}

/// Where the extracted payload goes in the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadPlacement {
    /// JSON request body.
    Body,
    /// URL query string; `null` fields are omitted.
    Query,
}

/// Static configuration of one API-backed handler.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub name: String,
    pub mission: String,
    pub examples: Vec<Example>,
    pub schema: ExtractionSchema,
    pub derived: Vec<DerivedField>,
    pub method: HttpMethod,
    pub url: String,
    pub placement: PayloadPlacement,
}

impl HandlerDescriptor {
    pub fn api(
        name: impl Into<String>,
        method: HttpMethod,
        url: impl Into<String>,
        placement: PayloadPlacement,
    ) -> Self {
        let name = name.into();
        Self {
            schema: ExtractionSchema::new(name.clone(), ""),
            name,
            mission: String::new(),
            examples: Vec::new(),
            derived: Vec::new(),
            method,
            url: url.into(),
            placement,
        }
    }

    pub fn mission(mut self, mission: impl Into<String>) -> Self {
        self.mission = mission.into();
        self
    }

    /// Add an example message labelled with this handler's name.
    pub fn example(mut self, message: impl Into<String>) -> Self {
        let label = self.name.clone();
        self.examples.push(Example::new(message, label));
        self
    }

    pub fn schema(mut self, schema: ExtractionSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn derive(mut self, field: DerivedField) -> Self {
        self.derived.push(field);
        self
    }
}

// ── Outbound response ─────────────────────────────────────────────────────────

/// Raw target API response, passed through without interpretation.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// All handler variants. Only HTTP-API integrations exist today.
#[derive(Debug, Clone)]
pub enum TargetHandler {
    Api(ApiHandler),
}

impl TargetHandler {
    pub fn name(&self) -> &str {
        match self {
            TargetHandler::Api(h) => &h.name,
        }
    }

    /// Assembled mission text shown to users (HTML).
    pub fn mission(&self) -> &str {
        match self {
            TargetHandler::Api(h) => &h.mission,
        }
    }

    pub fn examples(&self) -> &[Example] {
        match self {
            TargetHandler::Api(h) => &h.examples,
        }
    }

    /// Examples rendered for the classifier prompt, blank-line separated.
    pub fn describe(&self) -> String {
        self.examples()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub async fn extract(&self, llm: &LlmProvider, text: &str) -> Result<Payload, HandlerError> {
        match self {
            TargetHandler::Api(h) => h.extract_on(llm, text, Local::now().date_naive()).await,
        }
    }

    pub async fn dispatch(
        &self,
        http: &reqwest::Client,
        payload: &Payload,
    ) -> Result<ApiResponse, HandlerError> {
        match self {
            TargetHandler::Api(h) => h.dispatch(http, payload).await,
        }
    }

    /// `dispatch(extract(text))`.
    pub async fn handle(
        &self,
        llm: &LlmProvider,
        http: &reqwest::Client,
        text: &str,
    ) -> Result<ApiResponse, HandlerError> {
        let payload = self.extract(llm, text).await?;
        self.dispatch(http, &payload).await
    }
}

/// Handler that calls a fixed HTTP endpoint with the extracted payload.
#[derive(Debug, Clone)]
pub struct ApiHandler {
    name: String,
    mission: String,
    examples: Vec<Example>,
    schema: ExtractionSchema,
    derived: Vec<DerivedField>,
    method: HttpMethod,
    url: String,
    placement: PayloadPlacement,
}

impl ApiHandler {
    /// Deduplicate examples by message (first wins) and assemble the
    /// displayable mission.
    pub fn from_descriptor(d: HandlerDescriptor) -> Self {
        let mut seen = HashSet::new();
        let examples: Vec<Example> = d
            .examples
            .into_iter()
            .filter(|e| seen.insert(e.message.clone()))
            .collect();

        let mut lines = vec![
            format!("{} в {}.", html::escape(d.mission.trim()), html::escape(&d.url)),
            "Примеры запросов:".to_string(),
        ];
        lines.extend(examples.iter().map(|e| format!("• <i>{}</i>", html::escape(&e.message))));

        Self {
            name: d.name,
            mission: lines.join("\n"),
            examples,
            schema: d.schema,
            derived: d.derived,
            method: d.method,
            url: d.url,
            placement: d.placement,
        }
    }

    pub fn schema(&self) -> &ExtractionSchema {
        &self.schema
    }

    /// Extraction with an explicit `today` for derived fields.
    pub async fn extract_on(
        &self,
        llm: &LlmProvider,
        text: &str,
        today: NaiveDate,
    ) -> Result<Payload, HandlerError> {
        let mut payload = llm.extract(EXTRACT_TEMPLATE.trim(), text, &self.schema).await?;
        for field in &self.derived {
            field.apply(&mut payload, today)?;
        }
        debug!(handler = %self.name, ?payload, "payload extracted");
        Ok(payload)
    }

    pub async fn dispatch(
        &self,
        http: &reqwest::Client,
        payload: &Payload,
    ) -> Result<ApiResponse, HandlerError> {
        let request = http.request(self.method.into(), &self.url);
        let request = match self.placement {
            PayloadPlacement::Body => request.json(payload),
            PayloadPlacement::Query => request.query(&query_pairs(payload)),
        };

        info!(handler = %self.name, method = %self.method, url = %self.url, "calling target API");
        let response = request.send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        if !status.is_success() {
            warn!(handler = %self.name, %status, "target API returned non-success status");
        }
        debug!(handler = %self.name, %status, ?content_type, len = body.len(), "target API responded");

        Ok(ApiResponse { status, content_type, body })
    }
}

/// Flatten a payload into query pairs. `null` fields are skipped; strings go
/// in verbatim, other values in their JSON form.
fn query_pairs(payload: &Payload) -> Vec<(String, String)> {
    payload
        .iter()
        .filter_map(|(k, v)| match v {
            Value::Null => None,
            Value::String(s) => Some((k.clone(), s.clone())),
            other => Some((k.clone(), other.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> HandlerDescriptor {
        HandlerDescriptor::api("status_agent", HttpMethod::Get, "http://status.local/run", PayloadPlacement::Query)
            .mission("Проверить статус")
            .example("первый <запрос>")
            .example("второй")
            .example("первый <запрос>")
    }

    #[test]
    fn example_renders_two_lines() {
        let e = Example::new("ok 95, nok 5", "six_sigma_agent");
        assert_eq!(e.to_string(), "Сообщение: ok 95, nok 5\nОтвет: six_sigma_agent");
    }

    #[test]
    fn examples_are_deduplicated_by_message() {
        let handler = ApiHandler::from_descriptor(descriptor());
        let messages: Vec<&str> = handler.examples.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["первый <запрос>", "второй"]);
    }

    #[test]
    fn mission_lists_url_and_examples() {
        let handler = ApiHandler::from_descriptor(descriptor());
        assert_eq!(
            handler.mission,
            "Проверить статус в http://status.local/run.\n\
             Примеры запросов:\n\
             • <i>первый &lt;запрос&gt;</i>\n\
             • <i>второй</i>"
        );
    }

    #[test]
    fn mission_escapes_text_and_url() {
        let d = HandlerDescriptor::api(
            "status_agent",
            HttpMethod::Get,
            "https://x.local/standard?a=1&b=<2>",
            PayloadPlacement::Query,
        )
        .mission("Сравнить A & B <быстро>")
        .example("раз");
        let handler = ApiHandler::from_descriptor(d);
        let first = handler.mission.lines().next().unwrap();
        assert_eq!(
            first,
            "Сравнить A &amp; B &lt;быстро&gt; в https://x.local/standard?a=1&amp;b=&lt;2&gt;."
        );
        assert_eq!(handler.url, "https://x.local/standard?a=1&b=<2>");
    }

    #[test]
    fn describe_joins_examples_with_blank_lines() {
        let handler = TargetHandler::Api(ApiHandler::from_descriptor(descriptor()));
        assert_eq!(
            handler.describe(),
            "Сообщение: первый <запрос>\nОтвет: status_agent\n\nСообщение: второй\nОтвет: status_agent"
        );
    }

    #[test]
    fn http_methods_map_to_reqwest() {
        assert_eq!(Method::from(HttpMethod::Post), Method::POST);
        assert_eq!(Method::from(HttpMethod::Options), Method::OPTIONS);
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn query_pairs_skip_nulls() {
        let mut payload = Payload::new();
        payload.insert("tests".into(), json!(100));
        payload.insert("fails".into(), json!(5));
        payload.insert("name".into(), Value::Null);
        payload.insert("label".into(), json!("SSD"));
        let mut pairs = query_pairs(&payload);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("fails".to_string(), "5".to_string()),
                ("label".to_string(), "SSD".to_string()),
                ("tests".to_string(), "100".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn dummy_extraction_fills_nulls_and_derived_fields() {
        let handler = ApiHandler::from_descriptor(catalog::deposit("http://deposit.local/standard"));
        let llm = LlmProvider::Dummy(Default::default());
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let payload = handler.extract_on(&llm, "что угодно", today).await.unwrap();
        assert_eq!(payload["periods"], Value::Null);
        assert_eq!(payload["amount"], Value::Null);
        assert_eq!(payload["rate"], Value::Null);
        assert_eq!(payload["date"], json!("19.11.2026"));
    }

    #[tokio::test]
    async fn dummy_extraction_fails_without_required_fields() {
        let handler = ApiHandler::from_descriptor(catalog::six_sigma("http://sigma.local/chart"));
        let llm = LlmProvider::Dummy(Default::default());
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let err = handler.extract_on(&llm, "ok 95", today).await.unwrap_err();
        assert!(matches!(
            err,
            HandlerError::Extraction(ProviderError::Schema(SchemaError::MissingField(_)))
        ));
    }
}
