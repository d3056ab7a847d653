//! Email delivery over SMTP

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::{NotificationError, NotificationTransport};

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Upgrade the connection with STARTTLS
    pub use_tls: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            use_tls: true,
            user: None,
            password: None,
            from: "alerts@openshift.com".to_string(),
            to: "openshift-website-requests@redhat.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Plain-text email transport
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpTransport {
    /// Validate addresses and prepare the relay connection settings.
    ///
    /// No connection is opened until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| NotificationError::Build(format!("invalid from address: {}", e)))?;
        let to: Mailbox = config
            .to
            .parse()
            .map_err(|e| NotificationError::Build(format!("invalid to address: {}", e)))?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotificationError::Build(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            tls = config.use_tls,
            to = %config.to,
            "SMTP transport configured"
        );

        Ok(Self {
            mailer: builder.build(),
            from,
            to,
        })
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message, NotificationError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotificationError::Build(e.to_string()))
    }
}

#[async_trait]
impl NotificationTransport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotificationError> {
        let message = self.message(subject, body)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotificationError::Delivery(e.to_string()))?;

        info!(to = %self.to, subject = subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SmtpConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 25);
        assert!(config.use_tls);
        assert!(config.user.is_none());
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let config = SmtpConfig {
            from: "not an address".to_string(),
            ..SmtpConfig::default()
        };
        assert!(matches!(
            SmtpTransport::new(&config),
            Err(NotificationError::Build(_))
        ));
    }

    #[tokio::test]
    async fn test_plaintext_relay_builds_message() {
        let config = SmtpConfig {
            use_tls: false,
            ..SmtpConfig::default()
        };
        let transport = SmtpTransport::new(&config).unwrap();

        let message = transport
            .message("PausedAcmeRoutes - https://api.test:6443", "Alert(s) found:")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: PausedAcmeRoutes - https://api.test:6443"));
        assert!(raw.contains("To: openshift-website-requests@redhat.com"));
    }
}
