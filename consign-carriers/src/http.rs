use std::time::Duration;

use consign_core::CarrierError;
use serde_json::Value;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Build the per-carrier HTTP client. The timeout applies to every call.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, CarrierError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CarrierError::Transport(format!("failed to create HTTP client: {}", e)))
}

/// Classify a reqwest failure. Everything here happened below the carrier's API.
pub fn transport_error(err: reqwest::Error) -> CarrierError {
    if err.is_timeout() {
        CarrierError::Timeout(err.to_string())
    } else if err.is_decode() {
        CarrierError::Parse(err.to_string())
    } else {
        CarrierError::Transport(err.to_string())
    }
}

pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn endpoint_with_params(
    base: &str,
    path: &str,
    params: &[(&str, String)],
) -> Result<reqwest::Url, CarrierError> {
    reqwest::Url::parse_with_params(&endpoint(base, path), params)
        .map_err(|e| CarrierError::Validation(format!("invalid carrier URL: {}", e)))
}

/// Status and body of a carrier response, read fully before interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub async fn read(response: reqwest::Response) -> Result<Self, CarrierError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;
        Ok(Self { status, body })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_auth_failure(&self) -> bool {
        self.status == 401 || self.status == 403
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    pub fn json(&self) -> Result<Value, CarrierError> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&self.body)
            .map_err(|e| CarrierError::Parse(format!("invalid JSON (HTTP {}): {}", self.status, e)))
    }

    /// Body as JSON when possible, otherwise the raw text. Used for rejection details.
    pub fn details(&self) -> Value {
        self.json().unwrap_or_else(|_| Value::String(self.body.clone()))
    }

    pub fn server_error(&self) -> CarrierError {
        CarrierError::Transport(format!("carrier returned HTTP {}", self.status))
    }
}
