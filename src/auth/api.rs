//! Authentication API Endpoints
//! Mission: Provide registration, login, and account self-service endpoints

use crate::api::{ApiJson, AppState, Gates};
use crate::auth::models::{
    Identity, LoginRequest, RegisterRequest, Role, TokenResponse, UpdateDetailsRequest,
    UpdatePasswordRequest, User, UserResponse,
};
use crate::db;
use crate::errors::ApiError;
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, warn};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const USERNAME_TAKEN: &str = "Username already exists";
const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 6;

pub fn router(gates: &Gates) -> Router<AppState> {
    let public = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login));

    let account = gates.authenticated(
        Router::new()
            .route("/api/auth/me", get(get_current_user))
            .route("/api/auth/updatedetails", put(update_details))
            .route("/api/auth/updatepassword", put(update_password)),
    );

    public.merge(account)
}

/// Register endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let username = validate_username(&payload.username)?;
    validate_password(&payload.password)?;

    if state.users.get_user_by_username(&username)?.is_some() {
        return Err(ApiError::Conflict(USERNAME_TAKEN.to_string()));
    }

    // A concurrent registration can still win the race to the insert
    let users = state.users.clone();
    let password = payload.password;
    let user = run_blocking(move || users.create_user(&username, &password, Role::User))
        .await
        .map_err(username_conflict)?;

    Ok((StatusCode::CREATED, Json(token_response(&state, &user)?)))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (Some(username), Some(password)) = (payload.username, payload.password) else {
        return Err(missing_credentials());
    };
    if username.is_empty() || password.is_empty() {
        return Err(missing_credentials());
    }

    info!("🔐 Login attempt: {}", username);

    let users = state.users.clone();
    let candidate = username.clone();
    let authenticated = run_blocking(move || users.authenticate(&candidate, &password)).await?;
    let Some(user) = authenticated else {
        warn!("❌ Failed login attempt: {}", username);
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };

    info!(
        "✅ Login successful: {} ({})",
        user.username,
        user.role.as_str()
    );

    Ok(Json(token_response(&state, &user)?))
}

/// Get current user info - GET /api/auth/me
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Value>, ApiError> {
    let user = load_user(&state, &identity)?;
    Ok(Json(json!({
        "success": true,
        "data": UserResponse::from_user(&user),
    })))
}

/// Rename the current account - PUT /api/auth/updatedetails
pub async fn update_details(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<UpdateDetailsRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = validate_username(&payload.username)?;

    if let Some(existing) = state.users.get_user_by_username(&username)? {
        if existing.id != identity.id {
            return Err(ApiError::Conflict(USERNAME_TAKEN.to_string()));
        }
    }

    let user = state
        .users
        .update_username(&identity.id, &username)
        .map_err(username_conflict)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": UserResponse::from_user(&user),
    })))
}

/// Change password and issue a fresh token - PUT /api/auth/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = load_user(&state, &identity)?;

    let users = state.users.clone();
    let current_password = payload.current_password;
    let matches = run_blocking({
        let user = user.clone();
        move || users.check_password(&user, &current_password)
    })
    .await?;
    if !matches {
        warn!("❌ Wrong current password for {}", user.username);
        return Err(ApiError::Unauthorized("Password is incorrect".to_string()));
    }
    validate_password(&payload.new_password)?;

    let users = state.users.clone();
    let new_password = payload.new_password;
    let user_id = identity.id;
    let user = run_blocking(move || users.update_password(&user_id, &new_password))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    info!("🔑 Password changed for {}", user.username);
    Ok(Json(token_response(&state, &user)?))
}

fn token_response(state: &AppState, user: &User) -> Result<TokenResponse, ApiError> {
    let (token, expires_in) = state.jwt_handler.sign(user)?;
    Ok(TokenResponse {
        success: true,
        token,
        expires_in,
    })
}

/// Run a store call that hashes or verifies a password on the blocking pool.
async fn run_blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Password task failed")?
}

fn username_conflict(err: anyhow::Error) -> ApiError {
    if db::is_unique_violation(&err) {
        ApiError::Conflict(USERNAME_TAKEN.to_string())
    } else {
        ApiError::Internal(err)
    }
}

fn load_user(state: &AppState, identity: &Identity) -> Result<User, ApiError> {
    state
        .users
        .get_user_by_id(&identity.id)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

fn missing_credentials() -> ApiError {
    ApiError::BadRequest("Please provide username and password".to_string())
}

fn validate_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}
