//! Request handlers for the HTTP surface.
//!
//! Bodies and messages keep the exact wire shapes GUI clients parse:
//! successes are `{"message": ...}` / `{"response": ...}`, failures are
//! `{"detail": ...}` with 400 for validation and 500 for backend faults.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use ctxchat_core::errors::ContextError;
use ctxchat_core::ids::UserId;

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub user_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub user_id: String,
    pub document_text: String,
    pub document_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveDocumentRequest {
    pub user_id: String,
    pub document_name: String,
}

/// `user_id` query parameter, used by the GET endpoints and reset.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// Domain error as an HTTP response: taxonomy status plus `{"detail": msg}`.
pub struct ApiError(pub ContextError);

impl From<ContextError> for ApiError {
    fn from(error: ContextError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(req.user_id);
    let reply = state.orchestrator.converse(&user, &req.message).await?;
    Ok(Json(json!({ "response": reply })))
}

pub async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let user = UserId::new(req.user_id);
    let stream = state.orchestrator.converse_stream(&user, &req.message).await;
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream.map(Ok::<_, Infallible>)),
    )
}

pub async fn add_url(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(req.user_id);
    state.orchestrator.add_url(&user, &req.url).await?;
    Ok(Json(json!({ "message": "URL added and context updated" })))
}

pub async fn remove_url(
    State(state): State<AppState>,
    Json(req): Json<UrlRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(req.user_id);
    state.orchestrator.remove_url(&user, &req.url).await?;
    Ok(Json(json!({ "message": "URL removed and context updated" })))
}

pub async fn add_document(
    State(state): State<AppState>,
    Json(req): Json<AddDocumentRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(req.user_id);
    state
        .orchestrator
        .add_document(&user, &req.document_name, &req.document_text)
        .await?;
    Ok(Json(json!({ "message": "Document added and context updated" })))
}

pub async fn remove_document(
    State(state): State<AppState>,
    Json(req): Json<RemoveDocumentRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = UserId::new(req.user_id);
    state
        .orchestrator
        .remove_document(&user, &req.document_name)
        .await?;
    Ok(Json(json!({ "message": "Document removed and context updated" })))
}

pub async fn get_context_items(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<Value> {
    let user = UserId::new(query.user_id);
    let (urls, documents) = state.orchestrator.context_items(&user);
    Json(json!({ "urls": urls, "documents": documents }))
}

/// Older clients list URLs only; kept alongside `get_context_items`.
pub async fn get_urls(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<Value> {
    let user = UserId::new(query.user_id);
    let (urls, _) = state.orchestrator.context_items(&user);
    Json(json!({ "urls": urls }))
}

pub async fn reset_context(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Json<Value> {
    let user = UserId::new(query.user_id);
    state.orchestrator.reset(&user).await;
    Json(json!({ "message": "Context reset" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
