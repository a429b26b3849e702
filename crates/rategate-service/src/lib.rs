//! Rategate Service: transport-agnostic request-rate governance.
//!
//! Bounds how many attempts an actor (client address, or action + address)
//! may make per fixed window, and reports denials to external abuse
//! tracking. Components:
//! - [`address`]: spoof-resistant client address resolution
//! - [`key`]: rate-limit key derivation
//! - [`store`] / [`window`]: the shared counter store and fixed-window logic
//! - [`sweeper`]: background eviction of stale entries
//! - [`escalation`]: fire-and-forget violation reporting
//! - [`governor`]: the composed per-mount decision
//!
//! **Zero transport dependencies.** The HTTP adapter lives in `rategate-http`.

pub mod address;
pub mod clock;
pub mod error;
pub mod escalation;
pub mod governor;
pub mod key;
pub mod store;
pub mod sweeper;
pub mod window;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use error::{ServiceError, ServiceResult};
pub use governor::{GovernorConfig, RateGovernor, Verdict};
pub use store::{CounterStore, StoreConfig};

use clock::Clock;
use escalation::ViolationEscalator;

/// Action name used for the authentication governor.
pub const LOGIN_ACTION: &str = "login";

/// Default login budget: 5 attempts per 15 minutes.
pub const DEFAULT_LOGIN_CAP: u32 = 5;

/// Configuration subset relevant to the service layer.
///
/// Transport-specific config (host, port, log format) stays in the binary
/// crate's `Config` struct.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store: StoreConfig,
    /// Governor applied to general API traffic, keyed by address.
    pub general: GovernorConfig,
    /// Governor applied to authentication attempts, keyed by `login:<address>`.
    pub login: GovernorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            general: GovernorConfig::default(),
            login: GovernorConfig::for_action(
                LOGIN_ACTION,
                DEFAULT_LOGIN_CAP,
                governor::DEFAULT_WINDOW,
            ),
        }
    }
}

/// Shared service state, cloneable across all transport handlers.
///
/// Owns the single counter store; both governors count into it under
/// disjoint key shapes.
#[derive(Clone)]
pub struct ServiceState {
    inner: Arc<Inner>,
}

struct Inner {
    store: CounterStore,
    general: RateGovernor,
    login: RateGovernor,
    start_time: Instant,
}

impl ServiceState {
    /// Creates service state from config, with the default escalator.
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        Self::build(
            config,
            CounterStore::new(config.store),
            ViolationEscalator::default(),
        )
    }

    /// Creates service state with injected time source and escalator.
    pub fn with_parts(
        config: &ServiceConfig,
        clock: Arc<dyn Clock>,
        escalator: ViolationEscalator,
    ) -> ServiceResult<Self> {
        Self::build(
            config,
            CounterStore::with_clock(config.store, clock),
            escalator,
        )
    }

    fn build(
        config: &ServiceConfig,
        store: CounterStore,
        escalator: ViolationEscalator,
    ) -> ServiceResult<Self> {
        config.store.validate()?;
        let general =
            RateGovernor::new(store.clone(), config.general.clone(), escalator.clone())?;
        let login = RateGovernor::new(store.clone(), config.login.clone(), escalator)?;
        Ok(Self {
            inner: Arc::new(Inner {
                store,
                general,
                login,
                start_time: Instant::now(),
            }),
        })
    }

    /// Creates state with tight, test-friendly budgets.
    pub fn new_in_memory_with_limits(
        general_cap: u32,
        login_cap: u32,
        window: Duration,
    ) -> ServiceResult<Self> {
        let config = ServiceConfig {
            general: GovernorConfig::new(general_cap, window),
            login: GovernorConfig::for_action(LOGIN_ACTION, login_cap, window),
            ..ServiceConfig::default()
        };
        Self::new(&config)
    }

    pub fn store(&self) -> &CounterStore {
        &self.inner.store
    }

    pub fn general_governor(&self) -> &RateGovernor {
        &self.inner.general
    }

    pub fn login_governor(&self) -> &RateGovernor {
        &self.inner.login
    }

    /// Returns the service uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }
}
