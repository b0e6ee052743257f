//! Request body extraction with JSON error envelopes.

use crate::errors::ApiError;
use axum::extract::{rejection::JsonRejection, FromRequest};

/// `axum::Json` whose rejections render as 400 `{success: false, error}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
