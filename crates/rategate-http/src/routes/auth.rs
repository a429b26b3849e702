//! Authentication entry point, mounted behind the `login` governor.
//!
//! Credential checking belongs to the identity layer; this handler only
//! validates the request shape and acknowledges it, so the route can be
//! protected and exercised end to end.

use axum::Json;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub username: String,
}

pub async fn login(
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(LoginResponse {
            status: "accepted",
            username: req.username,
        }),
    ))
}
