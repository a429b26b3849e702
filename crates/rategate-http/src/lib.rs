//! Rategate HTTP: axum transport adapter for the rate governor.
//!
//! Provides:
//! - the governor middleware (`X-RateLimit-*` headers, 429 envelope)
//! - request-ID middleware
//! - a router mounting a general governor on `/api/*` and an action-scoped
//!   `login` governor on `/auth/login`

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use rategate_service::RateGovernor;

pub use state::AppState;

/// Puts every route of `router` behind `governor`.
pub fn govern<S>(router: Router<S>, governor: RateGovernor) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(axum::middleware::from_fn_with_state(
        governor,
        middleware::rate_limit::rate_limit_middleware,
    ))
}

/// Builds the HTTP router.
///
/// `/health` is ungoverned. `/api/*` counts against the general budget keyed
/// by address; `/auth/login` counts against the `login:<address>` budget.
pub fn router(state: AppState) -> Router {
    let api = govern(
        Router::new().route("/api/status", get(routes::system::status)),
        state.general_governor().clone(),
    );

    let auth = govern(
        Router::new().route("/auth/login", post(routes::auth::login)),
        state.login_governor().clone(),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(api)
        .merge(auth)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(
            middleware::request_id::request_id_middleware,
        ))
        .with_state(state)
}

/// Serve the HTTP router on the given listener with graceful shutdown.
///
/// Wraps `axum::serve` with `ConnectInfo<SocketAddr>` so the governor can
/// fall back to the peer address when no proxy header is present.
pub async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}
