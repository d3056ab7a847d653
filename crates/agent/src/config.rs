//! Agent configuration

use std::path::PathBuf;
use std::time::Duration;

use alert_agent_lib::cluster::CURRENT_CONTEXT;
use alert_agent_lib::{NotificationPolicy, SchedulerConfig, SmtpConfig};
use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Agent configuration, read from the process environment
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Instance name used in logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Comma separated kubeconfig contexts
    #[serde(default = "default_cluster_contexts")]
    pub cluster_contexts: String,

    /// Use the pod service account instead of a kubeconfig
    #[serde(default)]
    pub internal_cluster: bool,

    #[serde(default)]
    pub kube_config_file: Option<PathBuf>,

    #[serde(default)]
    pub remediation: bool,

    #[serde(default)]
    pub skip_email_for_successful_remediation: bool,

    /// Delay before the first run in seconds
    #[serde(default = "default_schedule_delay")]
    pub schedule_delay: u64,

    /// Period between runs in seconds
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval: u64,

    #[serde(default = "default_logging_level")]
    pub logging_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    #[serde(default = "default_timeout_secs")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub notification_timeout_secs: u64,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_smtp_use_tls")]
    pub smtp_use_tls: bool,

    #[serde(default)]
    pub smtp_user: Option<String>,

    #[serde(default)]
    pub smtp_pass: Option<String>,

    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    #[serde(default = "default_mail_to")]
    pub mail_to: String,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_cluster_contexts() -> String {
    CURRENT_CONTEXT.to_string()
}

fn default_schedule_delay() -> u64 {
    30
}

fn default_schedule_interval() -> u64 {
    3600
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_smtp_use_tls() -> bool {
    true
}

fn default_mail_from() -> String {
    "alerts@openshift.com".to_string()
}

fn default_mail_to() -> String {
    "openshift-website-requests@redhat.com".to_string()
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::default())
    }

    pub fn from_source(source: config::Environment) -> Result<Self> {
        let config: AgentConfig = config::Config::builder()
            .add_source(source)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.schedule_interval == 0 {
            bail!("SCHEDULE_INTERVAL must be greater than zero");
        }
        if self.gateway_timeout_secs == 0 || self.notification_timeout_secs == 0 {
            bail!("GATEWAY_TIMEOUT_SECS and NOTIFICATION_TIMEOUT_SECS must be greater than zero");
        }
        if self.smtp_user.is_some() != self.smtp_pass.is_some() {
            bail!("SMTP_USER and SMTP_PASS must be set together");
        }
        Ok(())
    }

    /// Configured contexts in order, `current` when none are given
    pub fn contexts(&self) -> Vec<String> {
        let contexts: Vec<String> = self
            .cluster_contexts
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        if contexts.is_empty() {
            vec![CURRENT_CONTEXT.to_string()]
        } else {
            contexts
        }
    }

    /// Log filter directive with common level aliases mapped to tracing levels
    pub fn log_directive(&self) -> String {
        let level = self.logging_level.trim().to_ascii_lowercase();
        match level.as_str() {
            "" => default_logging_level(),
            "warning" => "warn".to_string(),
            "critical" | "fatal" => "error".to_string(),
            _ => level,
        }
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.schedule_interval),
            startup_delay: Duration::from_secs(self.schedule_delay),
            contexts: self.contexts(),
            remediation_enabled: self.remediation,
        }
    }

    pub fn notification_policy(&self) -> NotificationPolicy {
        NotificationPolicy::new(self.skip_email_for_successful_remediation)
    }

    pub fn smtp_config(&self) -> SmtpConfig {
        SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            use_tls: self.smtp_use_tls,
            user: self.smtp_user.clone(),
            password: self.smtp_pass.clone(),
            from: self.mail_from.clone(),
            to: self.mail_to.clone(),
            timeout: self.notification_timeout(),
        }
    }
}
