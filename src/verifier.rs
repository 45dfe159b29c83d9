//! Verification delegate
//!
//! Hands a finalized signature to the trusted backend, which independently
//! re-derives whether the payment is acceptable (amount and recipient
//! match, order not already paid, no replay) and applies the durable state
//! changes. The client-side engine is never trusted with that authority.
//!
//! Response taxonomy:
//! - 2xx `{success:true}` → [`VerificationOutcome::Verified`]
//! - 2xx `{success:true, tempApproved:true, warning}` → `TemporarilyApproved`
//! - 2xx `{success:false, error}` → `Rejected` (terminal failure despite
//!   on-chain finality, e.g. wrong amount)
//! - HTTP status in the configured unavailable set → `DelegateUnavailable`
//! - any other HTTP error → hard [`EngineError::DelegateHttp`]

use crate::errors::EngineError;
use crate::types::{ExpectedDetails, VerificationOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Verification endpoint URL
    pub endpoint: String,
    /// Network-level timeout for the verification POST, distinct from the
    /// polling timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// HTTP status codes classified as infrastructure unavailability rather
    /// than verification failure. Business-policy-sensitive; configurable
    /// rather than hardcoded.
    #[serde(default = "default_unavailable_statuses")]
    pub unavailable_statuses: Vec<u16>,
}

fn default_timeout_ms() -> u64 {
    20_000
}
fn default_unavailable_statuses() -> Vec<u16> {
    vec![502, 401, 403]
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8787/verify-payment".to_string(),
            timeout_ms: default_timeout_ms(),
            unavailable_statuses: default_unavailable_statuses(),
        }
    }
}

/// Seam for the backend verification call, mockable in tests
#[async_trait]
pub trait VerifyBackend: Send + Sync {
    async fn verify(
        &self,
        signature: &str,
        expected: Option<&ExpectedDetails>,
        order_id: Option<&str>,
    ) -> Result<VerificationOutcome, EngineError>;
}

/// HTTP implementation of the verification delegate
pub struct VerificationDelegate {
    http: reqwest::Client,
    config: VerifierConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    signature: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_details: Option<&'a ExpectedDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_id: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    success: bool,
    #[serde(default)]
    temp_approved: bool,
    #[serde(default)]
    warning: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl VerificationDelegate {
    pub fn new(config: VerifierConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EngineError::Configuration(format!("http client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl VerifyBackend for VerificationDelegate {
    async fn verify(
        &self,
        signature: &str,
        expected: Option<&ExpectedDetails>,
        order_id: Option<&str>,
    ) -> Result<VerificationOutcome, EngineError> {
        let body = VerifyRequest {
            signature,
            expected_details: expected,
            order_id,
        };

        let response = match self
            .http
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            // Connection refused and request timeout are the backend being
            // unreachable in the most literal sense; classified with the
            // unavailable statuses rather than as hard failures.
            Err(e) if e.is_connect() || e.is_timeout() => {
                warn!(signature, error = %e, "Verification backend unreachable");
                return Ok(VerificationOutcome::DelegateUnavailable);
            }
            Err(e) => {
                return Err(EngineError::Internal(format!(
                    "verification request failed: {e}"
                )))
            }
        };

        let status = response.status();
        if status.is_success() {
            let parsed: VerifyResponse = response.json().await.map_err(|e| {
                EngineError::Internal(format!("malformed verification response: {e}"))
            })?;

            if parsed.success {
                if parsed.temp_approved {
                    let warning = parsed
                        .warning
                        .unwrap_or_else(|| "verification deferred".to_string());
                    warn!(signature, warning = %warning, "Payment temporarily approved");
                    return Ok(VerificationOutcome::TemporarilyApproved { warning });
                }
                debug!(signature, "Payment verified by backend");
                return Ok(VerificationOutcome::Verified);
            }

            let reason = parsed
                .error
                .unwrap_or_else(|| "payment verification failed".to_string());
            return Ok(VerificationOutcome::Rejected { reason });
        }

        if self.config.unavailable_statuses.contains(&status.as_u16()) {
            warn!(
                signature,
                status = status.as_u16(),
                "Verification backend unavailable, deferring verification"
            );
            return Ok(VerificationOutcome::DelegateUnavailable);
        }

        let body = response.text().await.unwrap_or_default();
        Err(EngineError::DelegateHttp {
            status: status.as_u16(),
            body,
        })
    }
}
