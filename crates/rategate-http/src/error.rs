//! HTTP error envelope.
//!
//! Every error body has the shape
//! `{ "error": { "code": ..., "message": ..., "retryAfter"?: ... } }`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use rategate_service::{ServiceError, Verdict};

use crate::middleware::rate_limit::apply_quota_headers;

/// Code sent with every throttling response.
pub const RATE_LIMITED_CODE: &str = "AUTH_RATE_LIMITED";

/// Caller-facing throttling message.
pub const RATE_LIMITED_MESSAGE: &str = "Too many attempts. Please try again later.";

/// HTTP API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Rate limit exceeded. The response carries the verdict's quota headers.
    #[error("too many requests")]
    TooManyRequests(Verdict),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::TooManyRequests(verdict) => Self::TooManyRequests(verdict),
            ServiceError::InvalidConfig(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, verdict) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "BAD_REQUEST",
                    message,
                    retry_after: None,
                },
                None,
            ),
            ApiError::TooManyRequests(verdict) => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    code: RATE_LIMITED_CODE,
                    message: RATE_LIMITED_MESSAGE.to_string(),
                    retry_after: Some(verdict.retry_after.unwrap_or(0)),
                },
                Some(verdict),
            ),
            ApiError::Internal(message) => {
                tracing::error!(%message, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message,
                        retry_after: None,
                    },
                    None,
                )
            }
        };

        let mut response = (status, Json(ErrorEnvelope { error: body })).into_response();
        if let Some(verdict) = verdict {
            apply_quota_headers(response.headers_mut(), &verdict);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta};
    use rategate_service::window::RateLimitDecision;

    use super::*;

    fn denied(retry_after: u64) -> Verdict {
        let reset_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Verdict {
            limit: 5,
            decision: RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: reset_at + TimeDelta::seconds(retry_after as i64),
            },
            retry_after: Some(retry_after),
        }
    }

    #[tokio::test]
    async fn throttled_envelope_shape() {
        let response = ApiError::TooManyRequests(denied(42)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "42");
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(response.headers()["x-ratelimit-reset"], "1700000042");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "AUTH_RATE_LIMITED");
        assert_eq!(body["error"]["retryAfter"], 42);
        assert!(body["error"]["message"].is_string());
    }

    #[test]
    fn service_error_maps_to_status() {
        let throttled: ApiError = ServiceError::TooManyRequests(denied(3)).into();
        let response = throttled.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "3");

        let config: ApiError = ServiceError::InvalidConfig("bad".into()).into();
        let response = config.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}
