use axum::{middleware, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{
    self, auth_middleware, role_middleware, AuthGate, JwtHandler, RoleGate, UserStore,
};
use crate::errors::ApiError;
use crate::memories::{self, MemoryStore};
use crate::messages::{self, MessageStore};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimiter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
    pub messages: Arc<MessageStore>,
    pub memories: Arc<MemoryStore>,
}

/// Request gates available at route registration.
///
/// Each helper wraps the router from the outside, so the gate applied last
/// runs first. Apply `rate_limited` after `with_roles` to count a request
/// before its token is checked.
#[derive(Clone)]
pub struct Gates {
    pub auth: AuthGate,
    pub message_limiter: RateLimiter,
}

impl Gates {
    /// Require a valid bearer token
    pub fn authenticated(&self, router: Router<AppState>) -> Router<AppState> {
        router.route_layer(middleware::from_fn_with_state(
            self.auth.clone(),
            auth_middleware,
        ))
    }

    /// Require a valid bearer token whose role `roles` accepts
    pub fn with_roles(&self, router: Router<AppState>, roles: RoleGate) -> Router<AppState> {
        // route_layer wraps outward, so the role check is added first
        let router = router.route_layer(middleware::from_fn_with_state(
            Arc::new(roles),
            role_middleware,
        ));
        self.authenticated(router)
    }

    pub fn rate_limited(&self, router: Router<AppState>, limiter: RateLimiter) -> Router<AppState> {
        router.route_layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
    }
}

/// Create the API router
pub fn create_router(state: AppState, gates: Gates) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(auth::api::router(&gates))
        .merge(messages::api::router(&gates))
        .merge(memories::api::router(&gates))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

/// Parse a path id; anything unparseable cannot name a record.
pub fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(not_found.to_string()))
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
