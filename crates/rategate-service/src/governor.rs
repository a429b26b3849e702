//! Per-mount rate governor: resolve key, evaluate, escalate on denial.
//!
//! A `RateGovernor` is built once per protected route group and shared by
//! every request through it. It never blocks: evaluation is an in-memory
//! map update and escalation is dispatched to detached tasks.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};
use crate::escalation::{Violation, ViolationEscalator};
use crate::key::{KeyDeriver, RequestContext};
use crate::store::CounterStore;
use crate::window::RateLimitDecision;

/// Default attempt ceiling per window.
pub const DEFAULT_CAP: u32 = 100;

/// Default window length: 15 minutes.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Settings for one mounted governor.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Attempts allowed per window. The `cap + 1`-th attempt is denied.
    pub cap: u32,
    /// Length of the fixed window.
    pub window: Duration,
    /// How the base key is computed. Defaults to the client address.
    pub key_deriver: KeyDeriver,
    /// Action name prefixed to the key (`login:<address>`). None by default.
    pub action_prefix: Option<String>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            cap: DEFAULT_CAP,
            window: DEFAULT_WINDOW,
            key_deriver: KeyDeriver::Address,
            action_prefix: None,
        }
    }
}

impl GovernorConfig {
    pub fn new(cap: u32, window: Duration) -> Self {
        Self {
            cap,
            window,
            ..Self::default()
        }
    }

    /// Config for an action-scoped governor such as `login`.
    pub fn for_action(action: impl Into<String>, cap: u32, window: Duration) -> Self {
        Self {
            action_prefix: Some(action.into()),
            ..Self::new(cap, window)
        }
    }

    #[must_use]
    pub fn with_key_deriver(mut self, key_deriver: KeyDeriver) -> Self {
        self.key_deriver = key_deriver;
        self
    }

    /// Checks the config against the store it will be mounted on.
    pub fn validate(&self, store: &CounterStore) -> ServiceResult<()> {
        if self.cap == 0 {
            return Err(ServiceError::InvalidConfig(
                "cap must be at least 1".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "window must be longer than zero".to_string(),
            ));
        }
        if self.window > store.stale_after() {
            return Err(ServiceError::window_exceeds_threshold(
                self.window,
                store.stale_after(),
            ));
        }
        if self
            .action_prefix
            .as_deref()
            .is_some_and(|action| action.is_empty())
        {
            return Err(ServiceError::InvalidConfig(
                "action prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one governed attempt, with everything a transport needs to
/// annotate its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub limit: u32,
    pub decision: RateLimitDecision,
    /// Seconds until the window resets. Set only when denied.
    pub retry_after: Option<u64>,
}

impl Verdict {
    pub fn allowed(&self) -> bool {
        self.decision.allowed
    }

    pub fn remaining(&self) -> u32 {
        self.decision.remaining
    }

    /// Window reset time as Unix epoch seconds.
    pub fn reset_epoch_secs(&self) -> i64 {
        self.decision.reset_at.timestamp()
    }
}

/// A configured governor bound to a counter store and escalator.
#[derive(Clone)]
pub struct RateGovernor {
    inner: Arc<GovernorInner>,
}

struct GovernorInner {
    store: CounterStore,
    config: GovernorConfig,
    escalator: ViolationEscalator,
}

impl RateGovernor {
    /// Builds a governor, rejecting configs the store cannot honor.
    pub fn new(
        store: CounterStore,
        config: GovernorConfig,
        escalator: ViolationEscalator,
    ) -> ServiceResult<Self> {
        config.validate(&store)?;
        Ok(Self {
            inner: Arc::new(GovernorInner {
                store,
                config,
                escalator,
            }),
        })
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &CounterStore {
        &self.inner.store
    }

    pub fn key_for(&self, ctx: &RequestContext) -> String {
        let config = &self.inner.config;
        config
            .key_deriver
            .derive(config.action_prefix.as_deref(), ctx)
    }

    /// Records one attempt and returns the verdict.
    ///
    /// Denials are escalated before returning, without waiting on the
    /// collaborators.
    pub fn check(&self, ctx: &RequestContext) -> Verdict {
        let GovernorInner {
            store,
            config,
            escalator,
        } = &*self.inner;

        let key = self.key_for(ctx);
        let decision = store.evaluate(&key, config.cap, config.window);

        if decision.allowed {
            return Verdict {
                limit: config.cap,
                decision,
                retry_after: None,
            };
        }

        let now = store.now();
        let retry_after = decision.retry_after(now);
        tracing::info!(%key, path = %ctx.path, retry_after, "rate limit exceeded");
        escalator.escalate(ctx.address, Violation::from_request(ctx, now));

        Verdict {
            limit: config.cap,
            decision,
            retry_after: Some(retry_after),
        }
    }

    /// Like [`check`](Self::check), but turns a denial into an error.
    pub fn enforce(&self, ctx: &RequestContext) -> ServiceResult<Verdict> {
        let verdict = self.check(ctx);
        if verdict.allowed() {
            Ok(verdict)
        } else {
            Err(ServiceError::TooManyRequests(verdict))
        }
    }

    /// Clears the counter for this governor's key for `ctx`.
    pub fn reset(&self, ctx: &RequestContext) -> bool {
        self.inner.store.reset(&self.key_for(ctx))
    }
}
