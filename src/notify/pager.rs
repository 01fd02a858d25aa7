//! PagerDuty incident triggering
//!
//! Uses the generic Events API (v1): one POST per incident, deduplicated by
//! PagerDuty on `incident_key`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::settings::PagerDutySettings;

#[derive(Debug, thiserror::Error)]
pub enum PagerError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code
    #[error("PagerDuty returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The API accepted the request but did not process the event
    #[error("PagerDuty rejected the event: {0}")]
    Rejected(String),
}

/// An incident to open (or re-trigger)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentTrigger {
    pub service_key: String,
    pub incident_key: String,
    pub description: String,
    pub details: serde_json::Value,
}

/// Something that can open incidents
#[async_trait]
pub trait Pager: Send + Sync {
    async fn trigger(&self, incident: &IncidentTrigger) -> Result<(), PagerError>;
}

#[derive(Serialize)]
struct TriggerEvent<'a> {
    event_type: &'static str,
    #[serde(flatten)]
    incident: &'a IncidentTrigger,
}

#[derive(Deserialize)]
struct EventResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Events API client
pub struct PagerDutyClient {
    client: reqwest::Client,
    endpoint: String,
}

impl PagerDutyClient {
    pub fn new(settings: &PagerDutySettings) -> Result<Self, PagerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

#[async_trait]
impl Pager for PagerDutyClient {
    async fn trigger(&self, incident: &IncidentTrigger) -> Result<(), PagerError> {
        let event = TriggerEvent {
            event_type: "trigger",
            incident,
        };

        let response = self.client.post(&self.endpoint).json(&event).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PagerError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let reply: EventResponse = response.json().await?;
        if reply.status != "success" {
            return Err(PagerError::Rejected(
                reply.message.unwrap_or(reply.status),
            ));
        }

        tracing::info!(incident_key = %incident.incident_key, "PagerDuty incident triggered");
        Ok(())
    }
}
