//! OpenAI-compatible adapters against an in-process mock API.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contextual_retrieval::embedding::OpenAIEmbedder;
use contextual_retrieval::llm::OpenAIChat;
use contextual_retrieval::openai::OpenAIClient;
use contextual_retrieval_core::traits::{ChatCompleter, Embedder};

#[derive(Default)]
struct MockApi {
    calls: AtomicUsize,
    /// Statuses to answer with before succeeding, consumed front to back.
    failures: Mutex<Vec<u16>>,
    requests: Mutex<Vec<Value>>,
    auth: Mutex<Vec<Option<String>>>,
}

impl MockApi {
    fn failing_with(statuses: &[u16]) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(statuses.to_vec()),
            ..Default::default()
        })
    }

    /// Record the request and pop the next scripted failure, if any.
    fn record(&self, headers: &HeaderMap, body: Value) -> Option<StatusCode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(body);
        self.auth.lock().unwrap().push(
            headers
                .get("authorization")
                .map(|v| v.to_str().unwrap().to_string()),
        );
        let mut failures = self.failures.lock().unwrap();
        if failures.is_empty() {
            None
        } else {
            Some(StatusCode::from_u16(failures.remove(0)).unwrap())
        }
    }
}

async fn embeddings(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if let Some(status) = api.record(&headers, body) {
        return (status, Json(json!({ "error": { "message": "scripted" } })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.25, 0.5, 1.0] }],
            "model": "mock-embed"
        })),
    )
}

async fn chat_completions(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default().to_string();
    if let Some(status) = api.record(&headers, body) {
        return (status, Json(json!({ "error": { "message": "scripted" } })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": format!("echo: {}", prompt) },
                "finish_reason": "stop"
            }]
        })),
    )
}

/// Serve the mock on a random port and return its `/v1` base URL.
async fn serve(api: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(api);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}/v1", addr)
}

fn client(base_url: &str, key: Option<&str>, max_retries: u32) -> OpenAIClient {
    OpenAIClient::new(
        base_url,
        key.map(str::to_string),
        Duration::from_secs(10),
        max_retries,
    )
    .unwrap()
}

#[tokio::test]
async fn test_embedder_posts_model_and_input() {
    let api = Arc::new(MockApi::default());
    let base = serve(api.clone()).await;
    let embedder = OpenAIEmbedder::new(client(&base, Some("sk-test"), 0), "mock-embed", Some(3));

    let vector = embedder.embed("hello world").await.unwrap();

    assert_eq!(vector, vec![0.25, 0.5, 1.0]);
    assert_eq!(embedder.model_name(), "mock-embed");
    let requests = api.requests.lock().unwrap();
    assert_eq!(requests[0], json!({ "model": "mock-embed", "input": ["hello world"] }));
    assert_eq!(api.auth.lock().unwrap()[0].as_deref(), Some("Bearer sk-test"));
}

#[tokio::test]
async fn test_embedder_rejects_dimension_mismatch() {
    let api = Arc::new(MockApi::default());
    let base = serve(api.clone()).await;
    let embedder = OpenAIEmbedder::new(client(&base, None, 0), "mock-embed", Some(1536));

    let err = embedder.embed("hello").await.unwrap_err();
    assert!(err.to_string().contains("expected 1536"), "{}", err);
}

#[tokio::test]
async fn test_chat_sends_single_user_message() {
    let api = Arc::new(MockApi::default());
    let base = serve(api.clone()).await;
    let chat = OpenAIChat::new(client(&base, None, 0), "mock-chat");

    let answer = chat.chat("What is up?").await.unwrap();

    assert_eq!(answer, "echo: What is up?");
    let requests = api.requests.lock().unwrap();
    assert_eq!(
        requests[0],
        json!({
            "model": "mock-chat",
            "messages": [{ "role": "user", "content": "What is up?" }]
        })
    );
    // No key configured, no header sent.
    assert_eq!(api.auth.lock().unwrap()[0], None);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let api = MockApi::failing_with(&[500]);
    let base = serve(api.clone()).await;
    let chat = OpenAIChat::new(client(&base, None, 1), "mock-chat");

    let answer = chat.chat("again").await.unwrap();

    assert_eq!(answer, "echo: again");
    assert_eq!(api.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_without_retries_fails_once() {
    let api = MockApi::failing_with(&[429]);
    let base = serve(api.clone()).await;
    let chat = OpenAIChat::new(client(&base, None, 0), "mock-chat");

    let err = chat.chat("hi").await.unwrap_err();

    assert!(err.to_string().contains("429"), "{}", err);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let api = MockApi::failing_with(&[400]);
    let base = serve(api.clone()).await;
    let embedder = OpenAIEmbedder::new(client(&base, None, 3), "mock-embed", None);

    let err = embedder.embed("hi").await.unwrap_err();

    assert!(err.to_string().contains("400"), "{}", err);
    assert_eq!(api.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let chat = OpenAIChat::new(
        client(&format!("http://127.0.0.1:{}/v1", port), None, 0),
        "mock-chat",
    );
    assert!(chat.chat("anyone there?").await.is_err());
}
