//! Error types rendered as `{ "success": false, "error": ... }` JSON bodies.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use tracing::error;

pub const NOT_AUTHORIZED: &str = "Not authorized to access this route";
pub const ROLE_NOT_AUTHORIZED: &str = "User role is not authorized to access this route";
pub const TOO_MANY_REQUESTS: &str = "Too many requests, please try again later";
pub const SERVER_ERROR: &str = "Server Error";

pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "error": message }))).into_response()
}

/// Outcomes of the request gates that stop a request before its handler.
#[derive(Debug)]
pub enum GateError {
    /// No token, or a token that failed verification or names no user
    Unauthenticated,
    /// Authenticated, but the role is not accepted by the route
    Unauthorized,
    RateLimited { retry_after: Duration },
    /// The identity store failed or timed out
    LookupFault(anyhow::Error),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            GateError::Unauthenticated => error_response(StatusCode::UNAUTHORIZED, NOT_AUTHORIZED),
            GateError::Unauthorized => error_response(StatusCode::FORBIDDEN, ROLE_NOT_AUTHORIZED),
            GateError::RateLimited { retry_after } => {
                let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS);
                // Round up so clients never retry inside the window
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                response
            }
            GateError::LookupFault(err) => {
                error!("Identity lookup failed: {:#}", err);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
            }
        }
    }
}

/// Errors returned by route handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
            ApiError::Unauthorized(msg) => error_response(StatusCode::UNAUTHORIZED, &msg),
            ApiError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, &msg),
            ApiError::Conflict(msg) => error_response(StatusCode::CONFLICT, &msg),
            ApiError::Internal(err) => {
                error!("Request failed: {:#}", err);
                error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR)
            }
        }
    }
}
