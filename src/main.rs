//! Rategate Server entry point.

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use rategate_server::config::Config;
use rategate_server::{AppState, router, serve, spawn_sweeper};
use rategate_service::ServiceState;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let service_config = config.service_config();
    let service = match ServiceState::new(&service_config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start");
            std::process::exit(2);
        }
    };
    let state = AppState::new(service);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        rate_limit = config.rate_limit,
        login_rate_limit = config.login_rate_limit,
        stale_after = config.stale_after,
        "Rategate Server starting",
    );

    let sweeper = spawn_sweeper(state.store().clone(), service_config.store.sweep_interval);

    let app = router(state);

    let addr = SocketAddr::new(config.host.parse().expect("invalid host"), config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "Rategate Server ready");

    serve(listener, app, shutdown_signal())
        .await
        .expect("server error");

    sweeper.abort();
    tracing::info!("Rategate Server shut down");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install signal handler");
    tracing::info!("Shutdown signal received");
}
