//! Api-key authentication middleware for the management API.
//!
//! The management context is guarded by a single static key configured at
//! startup, presented in the `X-Api-Key` header. Only the key's hash is
//! kept in memory.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::infrastructure::crypto::api_key::{hash_api_key, verify_api_key};
use crate::interfaces::http::common::ApiResponse;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication state for management routes
#[derive(Clone)]
pub struct AuthState {
    key_hash: String,
}

impl AuthState {
    pub fn new(api_key: &str) -> Self {
        Self {
            key_hash: hash_api_key(api_key),
        }
    }
}

/// Api-key authentication middleware
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(key) if verify_api_key(key, &auth.key_hash) => next.run(request).await,
        Some(_) => unauthorized("Invalid api key"),
        None => unauthorized("Missing api key"),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}
