#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use genai::Content;
use serde_json::Value;

use chat_server::extract::TextExtractor;
use chat_server::history::HistoryStore;
use chat_server::kv::{KvStore, MemoryStore};
use chat_server::model::ChatModel;
use chat_server::{build_router, AppState};

/// Deterministic model: replies echo the message, so a retried message
/// reproduces the same (message, reply) pair.
pub struct EchoModel;

#[async_trait]
impl ChatModel for EchoModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(format!("Summary of {} characters", prompt.len()))
    }

    async fn chat_with_history(&self, _history: &[Content], message: &str) -> Result<String> {
        Ok(format!("Echo: {}", message))
    }
}

pub struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("quota exceeded"))
    }

    async fn chat_with_history(&self, _history: &[Content], _message: &str) -> Result<String> {
        Err(anyhow!("quota exceeded"))
    }
}

/// Store whose every operation fails, simulating an unreachable backend.
pub struct DownStore;

#[async_trait]
impl KvStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("connection refused"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

/// Store that reads and deletes normally but fails every write.
pub struct ReadOnlyStore {
    pub inner: Arc<MemoryStore>,
}

#[async_trait]
impl KvStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
        Err(anyhow!("READONLY You can't write against a read only replica"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
}

pub struct StubExtractor;

impl TextExtractor for StubExtractor {
    fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>> {
        Ok(vec![
            "First page of text.".to_string(),
            "Second page of text.".to_string(),
        ])
    }
}

pub struct FailingExtractor;

impl TextExtractor for FailingExtractor {
    fn extract_pages(&self, _bytes: &[u8]) -> Result<Vec<String>> {
        Err(anyhow!("unreadable xref table"))
    }
}

pub fn test_state(model: Arc<dyn ChatModel>, extractor: Arc<dyn TextExtractor>) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut state = test_state_with_store(store.clone(), model);
    state.extractor = extractor;
    (state, store)
}

pub fn test_state_with_store(store: Arc<dyn KvStore>, model: Arc<dyn ChatModel>) -> AppState {
    AppState {
        history: HistoryStore::new(store.clone()),
        store,
        model,
        extractor: Arc::new(StubExtractor),
        region: "test-region".to_string(),
        history_ttl_secs: 604_800,
        document_ttl_secs: 604_800,
    }
}

pub fn test_app() -> (Router, Arc<MemoryStore>) {
    let (state, store) = test_state(Arc::new(EchoModel), Arc::new(StubExtractor));
    (build_router(state), store)
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn post_chat(message: &str, session_id: &str, user_id: Option<&str>) -> Request<Body> {
    let mut body = serde_json::json!({
        "message": message,
        "sessionId": session_id,
    });
    if let Some(user_id) = user_id {
        body["userId"] = user_id.into();
    }
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_chat(session_id: &str, user_id: Option<&str>) -> Request<Body> {
    let uri = match user_id {
        Some(user_id) => format!("/chat?sessionId={}&userId={}", session_id, user_id),
        None => format!("/chat?sessionId={}", session_id),
    };
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete_chat(session_id: &str, user_id: Option<&str>) -> Request<Body> {
    let uri = match user_id {
        Some(user_id) => format!("/chat?sessionId={}&userId={}", session_id, user_id),
        None => format!("/chat?sessionId={}", session_id),
    };
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
