//! In-process HTTP stubs shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use intent_bot::config::{LlmConfig, OpenAiConfig};
use intent_bot::llm::{LlmProvider, providers};

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d];

/// Bind an ephemeral port and serve `router` on it in the background.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// ── LLM stub ──────────────────────────────────────────────────────────────────

/// Canned chat-completions backend keyed by the user message.
#[derive(Default)]
pub struct LlmStub {
    /// user message → classifier answer
    pub labels: HashMap<String, String>,
    /// user message → extraction answer (raw assistant content)
    pub extractions: HashMap<String, String>,
    /// answer every request with HTTP 500
    pub broken: bool,
    pub calls: AtomicUsize,
}

impl LlmStub {
    pub fn label(mut self, message: &str, label: &str) -> Self {
        self.labels.insert(message.into(), label.into());
        self
    }

    pub fn extraction(mut self, message: &str, content: &str) -> Self {
        self.extractions.insert(message.into(), content.into());
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

async fn chat_completions(State(stub): State<Arc<LlmStub>>, Json(request): Json<Value>) -> Response {
    stub.calls.fetch_add(1, Ordering::SeqCst);
    if stub.broken {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "overloaded", "code": "server_error" } })),
        )
            .into_response();
    }

    let user = request["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    let content = if request.get("response_format").is_some() {
        stub.extractions.get(&user).cloned().unwrap_or_else(|| "{}".into())
    } else {
        stub.labels.get(&user).cloned().unwrap_or_else(|| "offtop".into())
    };

    Json(json!({
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    }))
    .into_response()
}

/// Serve `stub` and return an OpenAI-compatible provider pointed at it.
pub async fn llm(stub: LlmStub) -> (LlmProvider, Arc<LlmStub>) {
    let stub = Arc::new(stub);
    let router = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(stub.clone());
    let addr = spawn(router).await;

    let config = LlmConfig {
        provider: "openai".into(),
        openai: OpenAiConfig {
            api_base_url: format!("http://{addr}/v1/chat/completions"),
            model: "GigaChat".into(),
            display_name: None,
            temperature: 0.0,
            timeout_seconds: 5,
        },
    };
    (providers::build(&config, Some("test-key".into())).unwrap(), stub)
}

// ── Target API stub ───────────────────────────────────────────────────────────

/// Records what the target endpoints received.
#[derive(Default)]
pub struct TargetStub {
    pub hits: AtomicUsize,
    pub last_body: Mutex<Option<Value>>,
    pub last_query: Mutex<Option<HashMap<String, String>>>,
}

impl TargetStub {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Echoes the JSON body back with a calculated field.
async fn standard(State(stub): State<Arc<TargetStub>>, Json(body): Json<Value>) -> Response {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    *stub.last_body.lock().unwrap() = Some(body.clone());
    (
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        json!({ "request": body, "total": 1234.5 }).to_string(),
    )
        .into_response()
}

async fn chart(State(stub): State<Arc<TargetStub>>, Query(query): Query<HashMap<String, String>>) -> Response {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    *stub.last_query.lock().unwrap() = Some(query);
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}

async fn html(State(stub): State<Arc<TargetStub>>) -> Response {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "text/html")], "<h1>hi</h1>").into_response()
}

async fn rejected(State(stub): State<Arc<TargetStub>>) -> Response {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        [(header::CONTENT_TYPE, "application/problem+json")],
        r#"{"detail":"amount must be positive"}"#,
    )
        .into_response()
}

/// Serve the target endpoints; returns their base URL.
pub async fn target() -> (String, Arc<TargetStub>) {
    let stub = Arc::new(TargetStub::default());
    let router = Router::new()
        .route("/standard", post(standard))
        .route("/chart", get(chart))
        .route("/html", post(html))
        .route("/rejected", post(rejected))
        .with_state(stub.clone());
    let addr = spawn(router).await;
    (format!("http://{addr}"), stub)
}
