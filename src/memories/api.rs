//! Memory API Endpoints
//! Mission: Public gallery listing, admin-managed catalogue

use crate::api::{parse_id, ApiJson, AppState, Gates};
use crate::auth::middleware::RoleGate;
use crate::auth::models::Identity;
use crate::errors::ApiError;
use crate::memories::store::DuplicateFilename;
use crate::memories::models::{
    CreateMemoriesRequest, ListMemoriesQuery, MediaType, UpdateMemoryRequest,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

const MEMORY_NOT_FOUND: &str = "Memory not found";
const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub fn router(gates: &Gates) -> Router<AppState> {
    let public = Router::new().route("/api/memories", get(list_memories));

    let admin = gates.with_roles(
        Router::new()
            .route("/api/memories", post(create_memories))
            .route("/api/memories/:id", put(update_memory).delete(delete_memory)),
        RoleGate::admin_only(),
    );

    public.merge(admin)
}

/// Register uploaded media - POST /api/memories (Admin only)
pub async fn create_memories(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<CreateMemoriesRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let batch = payload.validate().map_err(ApiError::BadRequest)?;
    let memories = state.memories.create_many(batch).map_err(|err| {
        let duplicate = err.downcast_ref::<DuplicateFilename>().map(|d| d.to_string());
        match duplicate {
            Some(message) => ApiError::Conflict(message),
            None => ApiError::Internal(err),
        }
    })?;

    info!(
        "🖼️  {} memories added by {}",
        memories.len(),
        identity.id
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "count": memories.len(),
            "data": memories,
        })),
    ))
}

/// List memories - GET /api/memories?type=&page=&limit=
pub async fn list_memories(
    State(state): State<AppState>,
    Query(params): Query<ListMemoriesQuery>,
) -> Result<Json<Value>, ApiError> {
    let media_type = match params.media_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            MediaType::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown media type: {}", raw)))?,
        ),
    };
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let result = state.memories.list(media_type, page, limit)?;
    let pages = result.total.div_ceil(u64::from(limit));

    Ok(Json(json!({
        "success": true,
        "count": result.memories.len(),
        "total": result.total,
        "data": result.memories,
        "pagination": {
            "current": page,
            "pages": pages,
        },
    })))
}

/// Update memory title - PUT /api/memories/:id (Admin only)
pub async fn update_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateMemoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, MEMORY_NOT_FOUND)?;
    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let memory = state
        .memories
        .update_title(&id, title)?
        .ok_or_else(|| ApiError::NotFound(MEMORY_NOT_FOUND.to_string()))?;

    Ok(Json(json!({ "success": true, "data": memory })))
}

/// Delete memory - DELETE /api/memories/:id (Admin only)
pub async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, MEMORY_NOT_FOUND)?;
    let memory = state
        .memories
        .delete(&id)?
        .ok_or_else(|| ApiError::NotFound(MEMORY_NOT_FOUND.to_string()))?;

    info!("🗑️  Memory deleted: {} ({})", memory.id, memory.path);
    Ok(Json(json!({ "success": true, "data": {} })))
}
