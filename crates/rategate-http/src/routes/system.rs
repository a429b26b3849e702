//! System and health endpoints.

use axum::extract::{Json, State};
use axum::response::IntoResponse;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub tracked_keys: usize,
    pub general_cap: u32,
    pub login_cap: u32,
    pub window_seconds: u64,
}

/// Liveness check. Not rate limited.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_secs(),
    })
}

/// Governor status, served behind the general governor.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let general = state.general_governor().config();
    Json(StatusResponse {
        tracked_keys: state.store().len(),
        general_cap: general.cap,
        login_cap: state.login_governor().config().cap,
        window_seconds: general.window.as_secs(),
    })
}
