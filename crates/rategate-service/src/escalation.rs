//! Fire-and-forget reporting of denied attempts.
//!
//! Each denial is handed to two collaborators: a violation log (analytics,
//! audit) and an auto-blocker that decides on longer-lived bans. Both calls
//! run as detached tasks. Their results are dropped on purpose; the
//! throttling response never waits on them or reflects their outcome.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::address::ClientAddress;
use crate::error::EscalationError;
use crate::key::RequestContext;

/// One denied attempt, as reported to the violation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub ip: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Violation {
    pub fn from_request(ctx: &RequestContext, timestamp: DateTime<Utc>) -> Self {
        Self {
            ip: ctx.address.to_string(),
            path: ctx.path.clone(),
            timestamp,
            user_agent: ctx.user_agent.clone(),
            user_id: ctx.user_id.clone(),
        }
    }
}

/// Sink for violation records.
#[async_trait]
pub trait ViolationLog: Send + Sync {
    async fn record(&self, violation: &Violation) -> Result<(), EscalationError>;
}

/// Longer-lived blocking subsystem. Decides on its own when an address has
/// accumulated enough violations to be blocked outright.
#[async_trait]
pub trait AutoBlocker: Send + Sync {
    async fn report(&self, ip: IpAddr) -> Result<(), EscalationError>;
}

/// Violation log that emits a structured `warn` event per denial.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingViolationLog;

#[async_trait]
impl ViolationLog for TracingViolationLog {
    async fn record(&self, violation: &Violation) -> Result<(), EscalationError> {
        tracing::warn!(
            ip = %violation.ip,
            path = %violation.path,
            timestamp = %violation.timestamp,
            user_agent = violation.user_agent.as_deref(),
            user_id = violation.user_id.as_deref(),
            "rate limit violation",
        );
        Ok(())
    }
}

/// Auto-blocker that accepts and ignores every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAutoBlocker;

#[async_trait]
impl AutoBlocker for NoopAutoBlocker {
    async fn report(&self, _ip: IpAddr) -> Result<(), EscalationError> {
        Ok(())
    }
}

/// Dispatches violations to the log and the auto-blocker.
#[derive(Clone)]
pub struct ViolationEscalator {
    log: Arc<dyn ViolationLog>,
    blocker: Arc<dyn AutoBlocker>,
}

impl Default for ViolationEscalator {
    fn default() -> Self {
        Self::new(Arc::new(TracingViolationLog), Arc::new(NoopAutoBlocker))
    }
}

impl ViolationEscalator {
    pub fn new(log: Arc<dyn ViolationLog>, blocker: Arc<dyn AutoBlocker>) -> Self {
        Self { log, blocker }
    }

    /// Reports a violation without waiting for either collaborator.
    ///
    /// The auto-blocker is skipped for the `unknown` bucket, which is shared
    /// by every client whose address could not be resolved. Outside a tokio
    /// runtime nothing is dispatched.
    pub fn escalate(&self, address: ClientAddress, violation: Violation) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(ip = %violation.ip, "no runtime; violation not escalated");
            return;
        };

        let log = Arc::clone(&self.log);
        runtime.spawn(async move {
            if let Err(e) = log.record(&violation).await {
                tracing::debug!(error = %e, "violation log failed; discarded");
            }
        });

        if let Some(ip) = address.ip() {
            let blocker = Arc::clone(&self.blocker);
            runtime.spawn(async move {
                if let Err(e) = blocker.report(ip).await {
                    tracing::debug!(error = %e, %ip, "auto-block report failed; discarded");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    struct ChannelLog(mpsc::UnboundedSender<Violation>);

    #[async_trait]
    impl ViolationLog for ChannelLog {
        async fn record(&self, violation: &Violation) -> Result<(), EscalationError> {
            let _ = self.0.send(violation.clone());
            Ok(())
        }
    }

    struct ChannelBlocker(mpsc::UnboundedSender<IpAddr>);

    #[async_trait]
    impl AutoBlocker for ChannelBlocker {
        async fn report(&self, ip: IpAddr) -> Result<(), EscalationError> {
            let _ = self.0.send(ip);
            Err(EscalationError::Unavailable("blocklist offline".into()))
        }
    }

    struct FailingLog;

    #[async_trait]
    impl ViolationLog for FailingLog {
        async fn record(&self, _violation: &Violation) -> Result<(), EscalationError> {
            Err(EscalationError::Rejected("quota".into()))
        }
    }

    fn violation(ip: &str) -> Violation {
        let ctx = RequestContext::new(
            ClientAddress::Known(ip.parse().unwrap()),
            "/auth/login",
        )
        .with_user_agent(Some("curl/8.0".into()));
        Violation::from_request(&ctx, Utc::now())
    }

    #[tokio::test]
    async fn both_collaborators_receive_the_violation() {
        let (log_tx, mut log_rx) = mpsc::unbounded_channel();
        let (block_tx, mut block_rx) = mpsc::unbounded_channel();
        let escalator = ViolationEscalator::new(
            Arc::new(ChannelLog(log_tx)),
            Arc::new(ChannelBlocker(block_tx)),
        );

        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        escalator.escalate(ClientAddress::Known(ip), violation("203.0.113.9"));

        let logged = tokio::time::timeout(Duration::from_secs(1), log_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(logged.ip, "203.0.113.9");
        assert_eq!(logged.path, "/auth/login");
        assert_eq!(logged.user_agent.as_deref(), Some("curl/8.0"));

        let blocked = tokio::time::timeout(Duration::from_secs(1), block_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blocked, ip);
    }

    #[tokio::test]
    async fn unknown_address_is_not_sent_to_blocker() {
        let (block_tx, mut block_rx) = mpsc::unbounded_channel();
        let escalator =
            ViolationEscalator::new(Arc::new(FailingLog), Arc::new(ChannelBlocker(block_tx)));

        escalator.escalate(ClientAddress::Unknown, violation("10.0.0.1"));
        tokio::task::yield_now().await;

        assert!(block_rx.try_recv().is_err());
    }

    #[test]
    fn escalate_outside_runtime_is_a_no_op() {
        ViolationEscalator::default()
            .escalate(ClientAddress::Unknown, violation("10.0.0.1"));
    }

    #[test]
    fn violation_serializes_camel_case() {
        let json = serde_json::to_value(violation("10.0.0.1")).unwrap();
        assert_eq!(json["ip"], "10.0.0.1");
        assert_eq!(json["userAgent"], "curl/8.0");
        assert!(json.get("userId").is_none());
    }
}
