//! HTTP application state: wraps `ServiceState` for axum handlers.
//!
//! `AppState` provides transparent access to all `ServiceState` methods
//! via `Deref`.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use rategate_service::{ServiceResult, ServiceState};

/// Shared HTTP application state, cloneable across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    service: ServiceState,
}

impl Deref for AppState {
    type Target = ServiceState;

    fn deref(&self) -> &ServiceState {
        &self.inner.service
    }
}

impl AppState {
    pub fn new(service: ServiceState) -> Self {
        Self {
            inner: Arc::new(AppInner { service }),
        }
    }

    /// Creates state with the given budgets and default store settings (for tests).
    pub fn new_in_memory_with_limits(
        general_cap: u32,
        login_cap: u32,
        window: Duration,
    ) -> ServiceResult<Self> {
        ServiceState::new_in_memory_with_limits(general_cap, login_cap, window).map(Self::new)
    }
}
