use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use empathy_backend::chat::ChatOrchestrator;
use empathy_backend::core::config::LlmSettings;
use empathy_backend::emotion::{ClassifierError, EmotionClassifier, EmotionResult};
use empathy_backend::llm::{LlmClient, OpenAiProvider};
use empathy_backend::rag::{ContextRetriever, DocumentStore, NewDocument, SqliteDocumentStore};
use empathy_backend::server;
use empathy_backend::state::AppState;

const ANXIOUS: &str = "I am feeling so anxious and stressed recently.";
const COLLECTION: &str = "emotion_kb";

/// Deterministic stand-in for the transformer: scores by keyword.
struct LexiconClassifier {
    labels: Vec<String>,
}

impl LexiconClassifier {
    fn new() -> Self {
        Self {
            labels: ["negative", "neutral", "positive"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EmotionClassifier for LexiconClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, text: &str) -> Result<EmotionResult, ClassifierError> {
        let lower = text.to_lowercase();
        let negative = ["anxious", "stressed", "sad"]
            .iter()
            .filter(|w| lower.contains(*w))
            .count() as f32;
        let positive = ["happy", "calm", "great"]
            .iter()
            .filter(|w| lower.contains(*w))
            .count() as f32;
        EmotionResult::from_logits(&self.labels, &[negative, 0.5, positive])
    }
}

struct Harness {
    _dir: TempDir,
    server: MockServer,
    app: Router,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let store = SqliteDocumentStore::open(dir.path().join("rag.db"))
        .await
        .unwrap();
    store.get_or_create_collection(COLLECTION).await.unwrap();
    store
        .add(
            COLLECTION,
            vec![
                NewDocument {
                    id: "breathing".to_string(),
                    text: "Slow breathing calms the nervous system.".to_string(),
                    embedding: vec![1.0, 0.0, 0.0],
                },
                NewDocument {
                    id: "grounding".to_string(),
                    text: "Grounding: name five things you can see.".to_string(),
                    embedding: vec![0.8, 0.2, 0.0],
                },
                NewDocument {
                    id: "sleep".to_string(),
                    text: "Keep a regular sleep schedule.".to_string(),
                    embedding: vec![0.0, 0.0, 1.0],
                },
            ],
        )
        .await
        .unwrap();

    let llm_settings = LlmSettings {
        base_url: server.base_url(),
        api_key: Some("sk-test".to_string()),
        timeout_secs: 1,
        ..LlmSettings::default()
    };
    let provider = Arc::new(OpenAiProvider::new(&llm_settings).unwrap());

    let retriever = ContextRetriever::new(Arc::new(store), provider.clone(), COLLECTION);
    let chat = ChatOrchestrator::new(
        Arc::new(LexiconClassifier::new()),
        retriever,
        LlmClient::new(provider),
    );

    let state = AppState::new(chat);

    Harness {
        _dir: dir,
        server,
        app: server::router(state),
    }
}

async fn mock_embeddings(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(200).json_body(json!({
                "data": [{ "index": 0, "embedding": [0.9, 0.1, 0.0] }]
            }));
        })
        .await;
}

fn chat_request(message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "message": message }).to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let h = harness().await;

    let response = h
        .app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn chat_returns_emotion_and_answer() {
    let h = harness().await;
    mock_embeddings(&h.server).await;
    let completion = h
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("User emotion (model detected): negative")
                .body_contains("Slow breathing calms the nervous system.")
                .body_contains("Keep a regular sleep schedule.");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "I hear you. Let's take a slow breath together." } }]
            }));
        })
        .await;

    let response = h.app.oneshot(chat_request(ANXIOUS)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    completion.assert_async().await;

    let answer = body["answer"].as_str().unwrap();
    assert!(!answer.is_empty());

    let label = body["emotion"]["label"].as_str().unwrap();
    assert!(["negative", "neutral", "positive"].contains(&label));
    assert_eq!(label, "negative");

    let scores = body["emotion"]["scores"].as_object().unwrap();
    assert_eq!(scores.len(), 3);
    let total: f64 = scores.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn repeated_chat_yields_identical_emotion() {
    let h = harness().await;
    mock_embeddings(&h.server).await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "You're not alone." } }]
            }));
        })
        .await;

    let first = json_body(h.app.clone().oneshot(chat_request(ANXIOUS)).await.unwrap()).await;
    let second = json_body(h.app.oneshot(chat_request(ANXIOUS)).await.unwrap()).await;

    assert_eq!(first["emotion"], second["emotion"]);
}

#[tokio::test]
async fn chat_survives_embedding_outage() {
    let h = harness().await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/embeddings");
            then.status(503).body("unavailable");
        })
        .await;
    let completion = h
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("No context available.");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "I'm here for you." } }]
            }));
        })
        .await;

    let response = h.app.oneshot(chat_request(ANXIOUS)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    completion.assert_async().await;
}

#[tokio::test]
async fn llm_failures_map_to_gateway_statuses() {
    let h = harness().await;
    mock_embeddings(&h.server).await;
    let limited = h
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("slow down");
        })
        .await;

    let response = h.app.clone().oneshot(chat_request(ANXIOUS)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(json_body(response).await["error"].is_string());

    limited.delete_async().await;
    h.server
        .mock_async(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(500).body("boom");
        })
        .await;

    let response = h.app.oneshot(chat_request(ANXIOUS)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let h = harness().await;

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"text": "hi"}"#))
        .unwrap();
    let response = h.app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let h = harness().await;

    let message = "a".repeat(2 * 1024 * 1024);
    let response = h.app.oneshot(chat_request(&message)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn cors_mirrors_origin_with_credentials() {
    let h = harness().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/chat")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = h.app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
}
