//! Failure notifications
//!
//! Two channels, email and paging, each attempted independently. A channel
//! that is not configured for the environment/suite pair is skipped silently;
//! a channel that fails to deliver is logged and does not affect the other.

mod email;
mod pager;

pub use email::{build_message, AlertEmail, EmailError, HtmlAttachment, Mailer, SmtpMailer};
pub use pager::{IncidentTrigger, Pager, PagerDutyClient, PagerError};

use regex::Regex;
use std::sync::{Arc, OnceLock};

use crate::common::settings::MailSettings;
use crate::common::{capitalize, titleize, Error, Result};
use crate::config::{EnvironmentConfig, SuiteConfig};
use crate::executor::RunOutput;

/// Paging keys shaped like this are email relays, not API service keys
const PAGER_RELAY_PATTERN: &str = r"@(.*)pagerduty\.com$";

/// Prefix of the incident key; the environment name is appended
const INCIDENT_KEY_PREFIX: &str = "scout";

const INCIDENT_DESCRIPTION: &str = "Scout tests failing!";

const REPORT_ATTACHMENT_NAME: &str = "results.html";

impl From<EmailError> for Error {
    fn from(e: EmailError) -> Self {
        Error::Notification(e.to_string())
    }
}

impl From<PagerError> for Error {
    fn from(e: PagerError) -> Self {
        Error::Notification(e.to_string())
    }
}

/// Whether a paging key is a PagerDuty email integration address
pub fn is_pager_relay_address(key: &str) -> bool {
    static RELAY: OnceLock<Regex> = OnceLock::new();
    RELAY
        .get_or_init(|| Regex::new(PAGER_RELAY_PATTERN).expect("relay pattern is a valid regex"))
        .is_match(key)
}

/// Deterministic incident key for an environment
pub fn incident_key(environment: &str) -> String {
    [INCIDENT_KEY_PREFIX, environment].join("_")
}

/// What happened on one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Not enabled for this environment/suite
    Skipped,
    Sent,
    Failed(String),
}

/// Outcome of both channels for one failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub email: ChannelStatus,
    pub paging: ChannelStatus,
}

/// Sends failure alerts
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    pager: Arc<dyn Pager>,
    from: String,
    pager_from: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        pager: Arc<dyn Pager>,
        from: impl Into<String>,
        pager_from: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            pager,
            from: from.into(),
            pager_from: pager_from.into(),
        }
    }

    /// Notifier using SMTP and the PagerDuty Events API
    pub fn from_settings(
        mail: &MailSettings,
        pagerduty: &crate::common::settings::PagerDutySettings,
    ) -> Result<Self> {
        Ok(Self::new(
            Arc::new(SmtpMailer::new(mail.clone())),
            Arc::new(PagerDutyClient::new(pagerduty)?),
            mail.from.clone(),
            mail.pager_from.clone(),
        ))
    }

    /// Alert on a failed run through every enabled channel
    pub async fn notify(
        &self,
        environment: &EnvironmentConfig,
        suite: &SuiteConfig,
        output: &RunOutput,
    ) -> Delivery {
        let body = output.alert_body();

        let email = match self.email_channel(environment, suite, output, &body).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    env = %environment.name,
                    suite = %suite.name,
                    error = %e,
                    "Failed to send email alert"
                );
                ChannelStatus::Failed(e.to_string())
            }
        };

        let paging = match self.paging_channel(environment, suite, output, &body).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(
                    env = %environment.name,
                    suite = %suite.name,
                    error = %e,
                    "Failed to send PagerDuty alert"
                );
                ChannelStatus::Failed(e.to_string())
            }
        };

        Delivery { email, paging }
    }

    async fn email_channel(
        &self,
        environment: &EnvironmentConfig,
        suite: &SuiteConfig,
        output: &RunOutput,
        body: &str,
    ) -> Result<ChannelStatus> {
        let to = match (&suite.email, environment.email_enabled) {
            (Some(to), true) => to,
            _ => return Ok(ChannelStatus::Skipped),
        };

        tracing::info!(to = %to, "Sending email alert");
        let email = AlertEmail {
            from: self.from.clone(),
            to: to.clone(),
            subject: format!(
                "Scout Alert: Tests failing on {} ({})",
                titleize(&suite.name),
                capitalize(&environment.name)
            ),
            body: body.to_string(),
            attachment: Some(HtmlAttachment {
                filename: REPORT_ATTACHMENT_NAME.to_string(),
                content: output.html.clone(),
            }),
        };
        self.deliver(&email).await
    }

    async fn paging_channel(
        &self,
        environment: &EnvironmentConfig,
        suite: &SuiteConfig,
        output: &RunOutput,
        body: &str,
    ) -> Result<ChannelStatus> {
        if !environment.pagerduty_enabled {
            return Ok(ChannelStatus::Skipped);
        }
        let Some(key) = suite.paging_key(environment) else {
            return Ok(ChannelStatus::Skipped);
        };

        tracing::info!(key = %key, "Triggering PagerDuty incident");

        if is_pager_relay_address(key) {
            let email = AlertEmail {
                from: self.pager_from.clone(),
                to: key.to_string(),
                subject: format!(
                    "DOWN alert: Scout tests failing on {} ({})",
                    titleize(&suite.name),
                    capitalize(&environment.name)
                ),
                body: body.to_string(),
                attachment: None,
            };
            return self.deliver(&email).await;
        }

        let incident = IncidentTrigger {
            service_key: key.to_string(),
            incident_key: incident_key(&environment.name),
            description: INCIDENT_DESCRIPTION.to_string(),
            details: output
                .results
                .as_ref()
                .map(|r| r.raw.clone())
                .unwrap_or(serde_json::Value::Null),
        };
        self.pager.trigger(&incident).await?;
        Ok(ChannelStatus::Sent)
    }

    /// Send one email; a mailer with no SMTP transport skips rather than fails
    async fn deliver(&self, email: &AlertEmail) -> Result<ChannelStatus> {
        match self.mailer.send(email).await {
            Ok(()) => Ok(ChannelStatus::Sent),
            Err(EmailError::NotConfigured) => {
                tracing::warn!(to = %email.to, "SMTP is not configured, skipping email alert");
                Ok(ChannelStatus::Skipped)
            }
            Err(e) => Err(e.into()),
        }
    }
}
