//! Carrier B: international shipment API (JSON, basic auth) with a separate
//! XML tracking servlet.

pub mod client;
pub mod service;
pub mod wire;

use consign_core::ServiceLevel;
use consign_shared::pii::Masked;
use serde::Deserialize;

use crate::http::default_timeout_secs;

pub use client::DhlClient;
pub use service::DhlService;

/// Where the tracking servlet's login id and licence key travel.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CredentialPlacement {
    /// `X-Login-Id` / `X-Licence-Key` request headers
    #[default]
    Header,
    /// Legacy `loginid` / `lickey` query parameters
    Query,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DhlConfig {
    pub base_url: String,
    pub tracking_base_url: String,
    pub api_key: Masked<String>,
    pub api_secret: Masked<String>,
    pub account_number: String,
    pub login_id: String,
    pub licence_key: Masked<String>,
    #[serde(default)]
    pub credential_placement: CredentialPlacement,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_product_code")]
    pub product_code: String,
    /// Product booked for express and overnight service levels
    #[serde(default = "default_express_product_code")]
    pub express_product_code: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_requestor_name")]
    pub requestor_name: String,
}

fn default_product_code() -> String { "P".to_string() }
fn default_express_product_code() -> String { "K".to_string() }
fn default_currency() -> String { "INR".to_string() }
fn default_requestor_name() -> String { "Fulfillment Desk".to_string() }

impl DhlConfig {
    pub fn product_for(&self, service: ServiceLevel) -> &str {
        if service.is_expedited() {
            &self.express_product_code
        } else {
            &self.product_code
        }
    }

    pub fn new(base_url: &str, tracking_base_url: &str, api_key: &str, api_secret: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            tracking_base_url: tracking_base_url.to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            account_number: String::new(),
            login_id: String::new(),
            licence_key: Masked::default(),
            credential_placement: CredentialPlacement::default(),
            timeout_secs: default_timeout_secs(),
            product_code: default_product_code(),
            express_product_code: default_express_product_code(),
            currency: default_currency(),
            requestor_name: default_requestor_name(),
        }
    }
}
