//! HTTP route handlers for the message endpoints.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use message_store::{FindAllPage, Message, MessageRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageRepository>,
    /// Size hint passed to `find_all` for every list request.
    pub page_size: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessage {
    pub user_id: Uuid,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessage {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Resume cursor; absent or empty starts from the beginning.
    pub cursor: Option<String>,
}

impl ListParams {
    fn cursor(&self) -> Result<u64, ApiError> {
        match self.cursor.as_deref().map(str::trim) {
            None | Some("") => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|_| ApiError::Malformed(format!("invalid cursor {:?}", raw))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub items: Vec<Message>,
    /// Cursor for the next page; absent once the listing is complete.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub next: u64,
}

fn is_zero(cursor: &u64) -> bool {
    *cursor == 0
}

fn message_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|e| ApiError::Malformed(e.body_text()))
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// Handle GET /messages
pub async fn list_messages(
    State(state): State<AppState>,
    query: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let Query(params) = query.map_err(|e| ApiError::Malformed(e.body_text()))?;

    let page = FindAllPage {
        offset: params.cursor()?,
        size: state.page_size,
    };
    let result = state.store.find_all(page).await?;

    Ok(Json(ListResponse {
        items: result.messages,
        next: result.cursor,
    }))
}

/// Handle POST /messages
pub async fn create_message(
    State(state): State<AppState>,
    body: Result<Json<CreateMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::Malformed(e.body_text()))?;

    let message = Message::new(body.user_id, body.text);
    state.store.insert(&message).await?;
    info!(id = %message.id, user_id = %message.user_id, "Message created");

    Ok((StatusCode::CREATED, Json(message)))
}

/// Handle GET /messages/:id
pub async fn get_message(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Message>, ApiError> {
    let id = message_id(path)?;
    let message = state.store.get(id).await?;
    Ok(Json(message))
}

/// Handle PUT /messages/:id
pub async fn update_message(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateMessage>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let id = message_id(path)?;
    let Json(body) = body.map_err(|e| ApiError::Malformed(e.body_text()))?;
    if body.text.is_empty() {
        return Err(ApiError::EmptyField("text"));
    }

    // Read-modify-write; concurrent updates are last-writer-wins.
    let mut message = state.store.get(id).await?;
    message.revise(body.text);
    state.store.update(&message).await?;
    info!(%id, "Message updated");

    Ok(Json(message))
}

/// Handle DELETE /messages/:id
pub async fn delete_message(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = message_id(path)?;
    state.store.delete(id).await?;
    info!(%id, "Message deleted");
    Ok(StatusCode::OK)
}
