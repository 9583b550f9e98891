//! Export transports.
//!
//! Defines the `ExportTransport` trait with the two delivery mechanisms
//! the CRM accepts: its REST contact API and an inbound webhook. Errors
//! are classified so the dispatcher can tell a retryable outage from a
//! fatal rejection.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use applebites_common::config::ExportConfig;

use crate::store::Assessment;

// ============================================================================
// Export Error
// ============================================================================

/// Errors raised while delivering an export.
#[derive(Debug, Clone)]
pub enum ExportError {
    /// Network failure (connection refused, timeout, DNS)
    Network(String),
    /// CRM asked us to slow down
    RateLimited { retry_after_secs: Option<u64> },
    /// CRM rejected the payload (4xx other than 429); retrying cannot help
    Rejected { status: u16, body: String },
    /// CRM-side failure (5xx); worth retrying
    Upstream { status: u16, body: String },
    /// Transport misconfiguration
    Config(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::Rejected { status, body } => write!(f, "HTTP {}: {}", status, body),
            Self::Upstream { status, body } => write!(f, "Upstream HTTP {}: {}", status, body),
            Self::Config(msg) => write!(f, "Transport config error: {}", msg),
        }
    }
}

impl std::error::Error for ExportError {}

impl ExportError {
    /// Check if the error is worth retrying on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Upstream { .. }
        )
    }

    /// Classify an HTTP response status with its body text.
    pub fn from_status(status: u16, body: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after_secs },
            400..=499 => Self::Rejected { status, body },
            _ => Self::Upstream { status, body },
        }
    }
}

// ============================================================================
// Contact Payload
// ============================================================================

/// Build the CRM contact payload for an assessment.
///
/// Captured into the outbox at enqueue time so a later dispatch pass
/// delivers exactly what was computed at submission.
pub fn contact_payload(assessment: &Assessment) -> serde_json::Value {
    serde_json::json!({
        "firstName": assessment.first_name,
        "lastName": assessment.last_name,
        "email": assessment.email,
        "companyName": assessment.company_name,
        "tags": [
            "applebites",
            format!("tier-{}", assessment.tier),
            format!("grade-{}", assessment.overall_score),
            format!("intent-{}", assessment.follow_up.as_str()),
        ],
        "customField": {
            "assessment_id": assessment.id,
            "adjusted_ebitda": assessment.adjusted_ebitda,
            "valuation_multiple": assessment.valuation_multiple,
            "low_estimate": assessment.low_estimate,
            "mid_estimate": assessment.mid_estimate,
            "high_estimate": assessment.high_estimate,
            "overall_score": assessment.overall_score.letter(),
            "naics_code": assessment.naics_code,
        },
    })
}

// ============================================================================
// Transport Trait
// ============================================================================

/// A delivery mechanism for CRM exports.
#[async_trait]
pub trait ExportTransport: Send + Sync {
    /// Transport kind for logs and the status endpoint (e.g. "rest", "webhook")
    fn kind(&self) -> &'static str;

    /// Deliver one contact payload. A single attempt; the dispatcher owns
    /// retries and backoff.
    async fn deliver(&self, payload: &serde_json::Value) -> Result<(), ExportError>;
}

/// Build the configured transport.
pub fn build_transport(config: &ExportConfig) -> Result<Arc<dyn ExportTransport>, ExportError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ExportError::Config(format!("failed to build HTTP client: {}", e)))?;

    match config.transport.as_str() {
        "rest" => Ok(Arc::new(RestTransport {
            client,
            endpoint: config.rest_endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })),
        "webhook" => {
            let url = config
                .webhook_url
                .clone()
                .ok_or_else(|| ExportError::Config("webhook transport requires webhook_url".into()))?;
            Ok(Arc::new(WebhookTransport { client, url }))
        }
        other => Err(ExportError::Config(format!(
            "unknown export transport: {}",
            other
        ))),
    }
}

// ============================================================================
// REST Transport
// ============================================================================

/// Delivery through the CRM's REST contact API.
pub struct RestTransport {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: String,
    pub(crate) api_key: Option<String>,
}

#[async_trait]
impl ExportTransport for RestTransport {
    fn kind(&self) -> &'static str {
        "rest"
    }

    async fn deliver(&self, payload: &serde_json::Value) -> Result<(), ExportError> {
        let url = format!("{}/contacts/v2/", self.endpoint);

        let mut request = self.client.post(&url).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExportError::Network(e.to_string()))?;

        check_response(response).await
    }
}

// ============================================================================
// Webhook Transport
// ============================================================================

/// Delivery through an inbound CRM webhook.
pub struct WebhookTransport {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
}

#[async_trait]
impl ExportTransport for WebhookTransport {
    fn kind(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, payload: &serde_json::Value) -> Result<(), ExportError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ExportError::Network(e.to_string()))?;

        check_response(response).await
    }
}

/// Map a non-success response onto the error taxonomy.
async fn check_response(response: reqwest::Response) -> Result<(), ExportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let retry_after_secs = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let body = response.text().await.unwrap_or_default();

    Err(ExportError::from_status(status.as_u16(), body, retry_after_secs))
}
