//! Message API Endpoints
//! Mission: Public contact form plus the admin inbox

use crate::api::{parse_id, ApiJson, AppState, Gates};
use crate::auth::middleware::RoleGate;
use crate::errors::ApiError;
use crate::messages::models::SubmitMessageRequest;
use axum::{
    extract::{Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

const MESSAGE_NOT_FOUND: &str = "Message not found";

/// Message routes. Submission is public but rate limited; everything else is
/// admin only.
pub fn router(gates: &Gates) -> Router<AppState> {
    let public = gates.rate_limited(
        Router::new().route("/api/messages", post(submit_message)),
        gates.message_limiter.clone(),
    );

    let admin = gates.with_roles(
        Router::new()
            .route("/api/messages", get(list_messages))
            .route("/api/messages/unread", get(unread_count))
            .route("/api/messages/:id/read", put(mark_read))
            .route("/api/messages/:id", delete(delete_message)),
        RoleGate::admin_only(),
    );

    public.merge(admin)
}

/// Submit a message - POST /api/messages
pub async fn submit_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<SubmitMessageRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let device = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let new_message = payload.validate(device).map_err(ApiError::BadRequest)?;
    let message = state.messages.create(new_message)?;

    info!("📬 New message {} from {}", message.id, message.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": message })),
    ))
}

/// List messages - GET /api/messages (Admin only)
pub async fn list_messages(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let messages = state.messages.list()?;
    Ok(Json(json!({
        "success": true,
        "count": messages.len(),
        "data": messages,
    })))
}

/// Unread count - GET /api/messages/unread (Admin only)
pub async fn unread_count(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.messages.count_unread()?;
    Ok(Json(json!({ "success": true, "count": count })))
}

/// Mark read - PUT /api/messages/:id/read (Admin only)
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, MESSAGE_NOT_FOUND)?;
    let message = state
        .messages
        .mark_read(&id)?
        .ok_or_else(|| ApiError::NotFound(MESSAGE_NOT_FOUND.to_string()))?;

    Ok(Json(json!({ "success": true, "data": message })))
}

/// Delete message - DELETE /api/messages/:id (Admin only)
pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, MESSAGE_NOT_FOUND)?;
    if !state.messages.delete(&id)? {
        return Err(ApiError::NotFound(MESSAGE_NOT_FOUND.to_string()));
    }

    info!("🗑️  Message deleted: {}", id);
    Ok(Json(json!({ "success": true, "data": {} })))
}
