//! Licensing authority client
//!
//! The authority issues one serial number per call. Calls are bounded by a
//! request timeout and retried with exponential backoff on transport errors
//! and server-side failures; client errors are returned immediately.

use async_trait::async_trait;
use keel_types::{IssuerAuth, LicenseFeatures, SerialNumber};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Licensing authority errors
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Connection, timeout or body read failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success response
    #[error("Licensing authority returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Success response without a usable serial number
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl LicenseError {
    /// Transport failures and 5xx responses may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            LicenseError::Transport(_) => true,
            LicenseError::Rejected { status, .. } => *status >= 500,
            LicenseError::Decode(_) => false,
        }
    }
}

/// An external authority able to mint license serial numbers
#[async_trait]
pub trait LicenseAuthority: Send + Sync {
    async fn create_license(
        &self,
        auth: &IssuerAuth,
        features: &LicenseFeatures,
    ) -> Result<SerialNumber, LicenseError>;
}

/// Exponential backoff between attempts of one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay (milliseconds)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum backoff delay (milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

/// Client settings for the HTTP authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseClientConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_endpoint() -> String {
    "https://account.cometbackup.com/api/v1/license/create_license".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LicenseClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateLicenseResponse {
    data: CreateLicenseData,
}

#[derive(Debug, Deserialize)]
struct CreateLicenseData {
    serial_number: String,
}

/// Form-encoded HTTP client for the licensing authority
#[derive(Debug, Clone)]
pub struct HttpLicenseAuthority {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryPolicy,
}

impl HttpLicenseAuthority {
    pub fn new(config: &LicenseClientConfig) -> Result<Self, LicenseError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            retry: config.retry.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn attempt(&self, auth: &IssuerAuth) -> Result<SerialNumber, LicenseError> {
        let form = [
            ("auth_type", "token"),
            ("email", auth.email.as_str()),
            ("token", auth.token.as_str()),
        ];
        let response = self.client.post(self.endpoint.as_str()).form(&form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(LicenseError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CreateLicenseResponse =
            serde_json::from_str(&body).map_err(|e| LicenseError::Decode(e.to_string()))?;
        if parsed.data.serial_number.is_empty() {
            return Err(LicenseError::Decode("empty serial number".to_string()));
        }
        Ok(SerialNumber::new(parsed.data.serial_number))
    }
}

#[async_trait]
impl LicenseAuthority for HttpLicenseAuthority {
    async fn create_license(
        &self,
        auth: &IssuerAuth,
        features: &LicenseFeatures,
    ) -> Result<SerialNumber, LicenseError> {
        debug!(email = %auth.email, features = ?features, endpoint = %self.endpoint, "Requesting license");

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(auth).await {
                Ok(serial) => return Ok(serial),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "License request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
