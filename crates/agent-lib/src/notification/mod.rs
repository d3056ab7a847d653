//! Alert notifications
//!
//! [`NotificationPolicy`] turns a report into a send/suppress decision and a
//! rendered message. [`Dispatcher`] hands rendered messages to a
//! [`NotificationTransport`], bounded by a timeout, and never retries.

mod recording;
mod smtp;

pub use recording::RecordingTransport;
pub use smtp::{SmtpConfig, SmtpTransport};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::AlertReport;
use crate::observability::{AgentMetrics, StructuredLogger};

/// Default upper bound on a single delivery
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

const BODY_HEADER: &str = "Alert(s) found:\n\n\t";
const LINE_SEPARATOR: &str = "\n\t";

/// Errors that can occur while delivering a notification
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Message could not be assembled (bad address, bad header)
    #[error("failed to build notification: {0}")]
    Build(String),

    /// Relay rejected the message or could not be reached
    #[error("failed to deliver notification: {0}")]
    Delivery(String),

    #[error("notification delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Outbound channel for rendered notifications
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Transport name for logs
    fn name(&self) -> &str;

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// What to do with a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing was found
    Skip,
    /// Everything was fixed and the operator asked not to hear about it
    Suppress,
    Send(Notification),
}

/// Decides whether and what to notify for a report
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationPolicy {
    suppress_on_full_success: bool,
}

impl NotificationPolicy {
    pub fn new(suppress_on_full_success: bool) -> Self {
        Self {
            suppress_on_full_success,
        }
    }

    pub fn suppress_on_full_success(&self) -> bool {
        self.suppress_on_full_success
    }

    pub fn decide(&self, report: &AlertReport) -> Decision {
        if report.is_empty() {
            return Decision::Skip;
        }

        if report.remediation_attempted
            && self.suppress_on_full_success
            && report.fully_remediated()
        {
            return Decision::Suppress;
        }

        Decision::Send(Self::render(report))
    }

    fn render(report: &AlertReport) -> Notification {
        let lines: Vec<String> = report
            .findings
            .iter()
            .map(|finding| {
                if report.remediation_attempted {
                    format!("{} - {}", finding.message(), finding.remediated().annotation())
                } else {
                    finding.message().to_string()
                }
            })
            .collect();

        Notification {
            subject: format!("{} - {}", report.check, report.cluster),
            body: format!("{}{}", BODY_HEADER, lines.join(LINE_SEPARATOR)),
        }
    }
}

/// Result of dispatching one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped,
    Suppressed,
    Sent,
    Failed,
}

/// Applies the policy and delivers through the transport
pub struct Dispatcher {
    transport: Arc<dyn NotificationTransport>,
    policy: NotificationPolicy,
    timeout: Duration,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        policy: NotificationPolicy,
        metrics: AgentMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            transport,
            policy,
            timeout: DEFAULT_DELIVERY_TIMEOUT,
            metrics,
            logger,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &NotificationPolicy {
        &self.policy
    }

    /// Decide and deliver. Delivery failures are logged and counted, never
    /// returned.
    pub async fn dispatch(&self, report: &AlertReport) -> DispatchOutcome {
        let notification = match self.policy.decide(report) {
            Decision::Skip => return DispatchOutcome::Skipped,
            Decision::Suppress => {
                info!(
                    scope = "cluster",
                    cluster = %report.cluster,
                    check = %report.check,
                    "All findings remediated, notification suppressed"
                );
                self.metrics.inc_notifications("suppressed");
                return DispatchOutcome::Suppressed;
            }
            Decision::Send(notification) => notification,
        };

        match self.deliver(&notification).await {
            Ok(()) => {
                debug!(
                    transport = self.transport.name(),
                    subject = %notification.subject,
                    "Notification sent"
                );
                self.metrics.inc_notifications("sent");
                DispatchOutcome::Sent
            }
            Err(e) => {
                self.logger.log_notification_failed(
                    &notification.subject,
                    &e.to_string(),
                    &notification.body,
                );
                self.metrics.inc_notifications("failed");
                DispatchOutcome::Failed
            }
        }
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        tokio::time::timeout(
            self.timeout,
            self.transport.send(&notification.subject, &notification.body),
        )
        .await
        .map_err(|_| NotificationError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ResourceKind;
    use crate::models::{Finding, ObjectRef};

    const HOST: &str = "https://api.test:6443";

    fn finding(name: &str, remediated: Option<bool>) -> Finding {
        let object = ObjectRef::new(ResourceKind::Route, name, Some("shop".to_string()));
        let mut finding =
            Finding::new(object, format!("Route {} is paused; Namespace: shop", name)).unwrap();
        if let Some(ok) = remediated {
            finding.record_remediation(ok);
        }
        finding
    }

    fn report(findings: Vec<Finding>, attempted: bool) -> AlertReport {
        let mut report = AlertReport::new("PausedAcmeRoutes", HOST).with_findings(findings);
        report.remediation_attempted = attempted;
        report
    }

    fn dispatcher(transport: Arc<RecordingTransport>, suppress: bool) -> Dispatcher {
        Dispatcher::new(
            transport,
            NotificationPolicy::new(suppress),
            AgentMetrics::new(),
            StructuredLogger::new("test"),
        )
    }

    #[test]
    fn test_empty_report_is_skipped() {
        let policy = NotificationPolicy::new(true);
        assert_eq!(policy.decide(&report(vec![], false)), Decision::Skip);
        assert_eq!(policy.decide(&report(vec![], true)), Decision::Skip);
    }

    #[test]
    fn test_alert_lists_plain_messages() {
        let policy = NotificationPolicy::new(false);
        let decision = policy.decide(&report(vec![finding("web", None), finding("api", None)], false));

        let Decision::Send(notification) = decision else {
            panic!("expected a notification");
        };
        assert_eq!(notification.subject, format!("PausedAcmeRoutes - {}", HOST));
        assert_eq!(
            notification.body,
            "Alert(s) found:\n\n\tRoute web is paused; Namespace: shop\n\tRoute api is paused; Namespace: shop"
        );
    }

    #[test]
    fn test_remediation_results_annotated() {
        let policy = NotificationPolicy::new(false);
        let findings = vec![
            finding("web", Some(true)),
            finding("api", Some(false)),
            finding("www", None),
        ];

        let Decision::Send(notification) = policy.decide(&report(findings, true)) else {
            panic!("expected a notification");
        };
        assert!(notification
            .body
            .contains("Route web is paused; Namespace: shop - Successfully remediated"));
        assert!(notification
            .body
            .contains("Route api is paused; Namespace: shop - Failed remediation"));
        assert!(notification
            .body
            .contains("Route www is paused; Namespace: shop - Not attempted"));
    }

    #[test]
    fn test_full_success_suppressed_only_when_enabled() {
        let findings = vec![finding("web", Some(true)), finding("api", Some(true))];

        assert_eq!(
            NotificationPolicy::new(true).decide(&report(findings.clone(), true)),
            Decision::Suppress
        );
        assert!(matches!(
            NotificationPolicy::new(false).decide(&report(findings, true)),
            Decision::Send(_)
        ));
    }

    #[test]
    fn test_unattempted_findings_never_suppressed() {
        let policy = NotificationPolicy::new(true);
        assert!(matches!(
            policy.decide(&report(vec![finding("web", None)], true)),
            Decision::Send(_)
        ));
        assert!(matches!(
            policy.decide(&report(vec![finding("web", None)], false)),
            Decision::Send(_)
        ));
    }

    #[tokio::test]
    async fn test_suppression_sends_nothing() {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(transport.clone(), true);

        let outcome = dispatcher
            .dispatch(&report(vec![finding("web", Some(true)), finding("api", Some(true))], true))
            .await;

        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_one_failure_is_reported() {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = dispatcher(transport.clone(), true);

        let outcome = dispatcher
            .dispatch(&report(vec![finding("web", Some(true)), finding("api", Some(false))], true))
            .await;

        assert_eq!(outcome, DispatchOutcome::Sent);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Route api is paused"));
        assert!(sent[0].body.contains("Failed"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_contained() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_failing(true);
        let dispatcher = dispatcher(transport.clone(), false);

        let outcome = dispatcher
            .dispatch(&report(vec![finding("web", None)], false))
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(transport.attempts(), 1);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delivery_times_out() {
        let transport = Arc::new(RecordingTransport::new());
        transport.set_delay(Duration::from_secs(60));
        let dispatcher = dispatcher(transport.clone(), false).with_timeout(Duration::from_secs(5));

        let outcome = dispatcher
            .dispatch(&report(vec![finding("web", None)], false))
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed);
    }
}
