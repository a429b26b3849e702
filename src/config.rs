//! Server configuration via CLI args and environment variables.

use std::time::Duration;

use clap::Parser;

use rategate_service::{GovernorConfig, LOGIN_ACTION, ServiceConfig, StoreConfig};

/// HTTP server protected by the rategate request-rate governor.
#[derive(Parser, Debug, Clone)]
#[command(name = "rategate-server", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "RATEGATE_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080, env = "RATEGATE_PORT")]
    pub port: u16,

    /// Attempts per window allowed on general API routes, per client address.
    #[arg(long, default_value_t = 100, env = "RATEGATE_RATE_LIMIT")]
    pub rate_limit: u32,

    /// General rate limit window in seconds.
    #[arg(long, default_value_t = 900, env = "RATEGATE_RATE_LIMIT_WINDOW")]
    pub rate_limit_window: u64,

    /// Login attempts per window allowed per client address.
    #[arg(long, default_value_t = 5, env = "RATEGATE_LOGIN_RATE_LIMIT")]
    pub login_rate_limit: u32,

    /// Login rate limit window in seconds.
    #[arg(long, default_value_t = 900, env = "RATEGATE_LOGIN_RATE_LIMIT_WINDOW")]
    pub login_rate_limit_window: u64,

    /// Seconds between sweeps of stale rate limit entries.
    #[arg(long, default_value_t = 60, env = "RATEGATE_SWEEP_INTERVAL")]
    pub sweep_interval: u64,

    /// Age in seconds after which an entry is evicted. Must be at least the
    /// longest configured window.
    #[arg(long, default_value_t = 3600, env = "RATEGATE_STALE_AFTER")]
    pub stale_after: u64,

    /// Log level.
    #[arg(long, default_value = "info", env = "RATEGATE_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[arg(long, default_value = "text", env = "RATEGATE_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// The service-layer subset of this config.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            store: StoreConfig {
                stale_after: Duration::from_secs(self.stale_after),
                sweep_interval: Duration::from_secs(self.sweep_interval),
            },
            general: GovernorConfig::new(
                self.rate_limit,
                Duration::from_secs(self.rate_limit_window),
            ),
            login: GovernorConfig::for_action(
                LOGIN_ACTION,
                self.login_rate_limit,
                Duration::from_secs(self.login_rate_limit_window),
            ),
        }
    }
}
