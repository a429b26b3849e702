//! Service-layer error types.
//!
//! `ServiceError` is transport-agnostic. The HTTP crate maps it to its own
//! wire format (status codes and the JSON error envelope).

use std::time::Duration;

use crate::governor::Verdict;

/// Service error shared across transports.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A governor or store was configured with values it cannot honor.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rate limit exceeded. Carries the denied verdict so transports can
    /// report the quota alongside the error.
    #[error("too many requests, retry after {}s", .0.retry_after.unwrap_or(0))]
    TooManyRequests(Verdict),
}

impl ServiceError {
    pub(crate) fn window_exceeds_threshold(window: Duration, stale_after: Duration) -> Self {
        Self::InvalidConfig(format!(
            "window of {}s is longer than the sweep threshold of {}s; \
             entries would be evicted while still counting",
            window.as_secs(),
            stale_after.as_secs()
        ))
    }
}

/// Failure reported by a violation collaborator (log sink or auto-blocker).
///
/// The escalator discards these; they exist so collaborators can report
/// failures in a typed way and so the discard is visible at the call site.
#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected the report: {0}")]
    Rejected(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
