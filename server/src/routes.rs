use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Extension, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::extract::TextExtractor;
use crate::history::{HistoryStore, DEFAULT_USER_ID};
use crate::kv::KvStore;
use crate::model::ChatModel;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Cap on aggregate extracted text; overflow is cut, not rejected.
const MAX_TEXT_LEN: usize = 50_000;
const TRUNCATION_MARKER: &str = "\n[Text truncated due to length]";

const SUMMARY_TIMEOUT: Duration = Duration::from_secs(30);
const SUMMARY_FALLBACK: &str =
    "Summary unavailable: the document was stored but could not be summarized.";

#[derive(Clone)]
pub struct AppState {
    pub history: HistoryStore,
    pub store: Arc<dyn KvStore>,
    pub model: Arc<dyn ChatModel>,
    pub extractor: Arc<dyn TextExtractor>,
    pub region: String,
    pub history_ttl_secs: u64,
    pub document_ttl_secs: u64,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/chat",
            get(get_history)
                .post(send_message)
                .delete(clear_history)
                .options(preflight),
        )
        .route("/upload-pdf", post(upload_pdf))
        .route("/health", get(health))
        // The layer cap sits above the handler cap so bodies just over the
        // limit still reach the handler's JSON-shaped 413.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// CORS preflight; the cors layer answers browser-issued preflights itself,
/// this keeps the method contract when the layer is absent.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    message: Option<String>,
    session_id: Option<String>,
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityQuery {
    session_id: Option<String>,
    user_id: Option<String>,
}

fn resolve_user_id(user_id: Option<String>) -> String {
    match user_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_USER_ID.to_string(),
    }
}

async fn send_message(
    Extension(state): Extension<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = match req.message {
        Some(m) if !m.trim().is_empty() => m,
        _ => return Err(ApiError::MissingField("message")),
    };
    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingField("sessionId"))?;
    let user_id = resolve_user_id(req.user_id);

    let start = Instant::now();

    // Read failures degrade to a fresh conversation rather than blocking
    // the reply.
    let log = state
        .history
        .load_or_empty(Some(&user_id), &session_id)
        .await;

    let reply = state
        .model
        .chat_with_history(&log, &message)
        .await
        .map_err(|e| ApiError::Model(e.to_string()))?;
    if reply.trim().is_empty() {
        return Err(ApiError::Model("empty reply from model".to_string()));
    }

    let log = HistoryStore::append_turn(log, &message, &reply);
    state
        .history
        .save_best_effort(Some(&user_id), &session_id, &log, state.history_ttl_secs)
        .await;

    let backend_delay = start.elapsed().as_millis() as u64;
    info!(session_id, backend_delay, "chat turn completed");

    Ok(Json(json!({
        "success": true,
        "response": reply,
        "region": state.region,
        "backendDelay": backend_delay,
        "sessionId": session_id,
        "messageCount": log.len(),
    })))
}

async fn get_history(
    Extension(state): Extension<AppState>,
    Query(query): Query<IdentityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingField("sessionId"))?;
    let user_id = resolve_user_id(query.user_id);

    // Unlike the chat path, a failed read here is surfaced: the caller asked
    // for the history itself.
    let history = state
        .history
        .load(Some(&user_id), &session_id)
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "history": history,
        "sessionId": session_id,
        "userId": user_id,
    })))
}

async fn clear_history(
    Extension(state): Extension<AppState>,
    Query(query): Query<IdentityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = query
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingField("sessionId"))?;
    let user_id = resolve_user_id(query.user_id);

    state
        .history
        .clear(Some(&user_id), &session_id)
        .await
        .map_err(|e| ApiError::Storage(e.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": "Conversation history cleared",
    })))
}

async fn upload_pdf(
    Extension(state): Extension<AppState>,
    Query(query): Query<IdentityQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = header_value(&headers, "x-session-id")
        .or(query.session_id)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "default".to_string());
    let user_id = resolve_user_id(header_value(&headers, "x-user-id").or(query.user_id));

    if body.is_empty() {
        return Err(ApiError::MissingField("file"));
    }
    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge(MAX_UPLOAD_BYTES));
    }
    if !body.starts_with(b"%PDF-") {
        return Err(ApiError::MalformedDocument(
            "missing PDF signature".to_string(),
        ));
    }

    let pages = state
        .extractor
        .extract_pages(&body)
        .map_err(|e| ApiError::MalformedDocument(e.to_string()))?;
    let page_count = pages.len();

    let mut text = pages.join("\n").trim().to_string();
    if text.is_empty() {
        text = "No text found in PDF.".to_string();
    }
    cap_text(&mut text);

    // Document writes are best-effort: the summary is still worth returning
    // even if the store is down.
    let text_key = format!("pdf:{}:session:{}", user_id, session_id);
    if let Err(e) = state
        .store
        .set(&text_key, &text, state.document_ttl_secs)
        .await
    {
        warn!(session_id, error = %e, "failed to persist extracted text");
    }

    let summary = summarize(&state, &text).await;
    let summary_key = format!("pdf-summary:{}:session:{}", user_id, session_id);
    if let Err(e) = state
        .store
        .set(&summary_key, &summary, state.document_ttl_secs)
        .await
    {
        warn!(session_id, error = %e, "failed to persist summary");
    }

    // Record the upload as a turn so follow-up questions see it. Never
    // fails the upload.
    let notice = format!("[Uploaded a PDF document ({} pages)]", page_count);
    let log = state
        .history
        .load_or_empty(Some(&user_id), &session_id)
        .await;
    let log = HistoryStore::append_turn(log, &notice, &summary);
    state
        .history
        .save_best_effort(Some(&user_id), &session_id, &log, state.history_ttl_secs)
        .await;

    info!(session_id, page_count, "pdf processed");

    Ok(Json(json!({
        "success": true,
        "message": "PDF processed and ready for generation.",
        "summary": summary,
        "metadata": {
            "pageCount": page_count,
            "textLength": text.len(),
            "summaryLength": summary.len(),
            "sessionId": session_id,
            "userId": user_id,
            "processedAt": Utc::now().to_rfc3339(),
        },
    })))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Summarize under a hard timeout; failure and timeout both degrade to a
/// placeholder instead of failing the upload.
async fn summarize(state: &AppState, text: &str) -> String {
    let prompt = format!(
        "Summarize the following document in a few short paragraphs:\n\n{}",
        text
    );
    match tokio::time::timeout(SUMMARY_TIMEOUT, state.model.generate(&prompt)).await {
        Ok(Ok(summary)) if !summary.trim().is_empty() => summary,
        Ok(Ok(_)) => {
            warn!("model returned an empty summary");
            SUMMARY_FALLBACK.to_string()
        }
        Ok(Err(e)) => {
            warn!(error = %e, "summary generation failed");
            SUMMARY_FALLBACK.to_string()
        }
        Err(_) => {
            warn!("summary generation timed out");
            SUMMARY_FALLBACK.to_string()
        }
    }
}

/// Cut `text` down to `MAX_TEXT_LEN` bytes on a char boundary and mark the
/// cut.
fn cap_text(text: &mut String) {
    if text.len() <= MAX_TEXT_LEN {
        return;
    }
    let mut cut = MAX_TEXT_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_MARKER);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_id_defaults() {
        assert_eq!(resolve_user_id(None), "default");
        assert_eq!(resolve_user_id(Some(String::new())), "default");
        assert_eq!(resolve_user_id(Some("u1".to_string())), "u1");
    }

    #[test]
    fn test_cap_text_is_marked() {
        let mut text = "a".repeat(MAX_TEXT_LEN + 10);
        cap_text(&mut text);
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.len(), MAX_TEXT_LEN + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_cap_text_respects_char_boundaries() {
        let mut text = "é".repeat(MAX_TEXT_LEN);
        cap_text(&mut text);
        assert!(text.len() <= MAX_TEXT_LEN + TRUNCATION_MARKER.len());
        assert!(text.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_short_text_untouched() {
        let mut text = "short".to_string();
        cap_text(&mut text);
        assert_eq!(text, "short");
    }
}
