//! Carrier A: domestic pickup, waybill and tracking API (JSON over REST,
//! JWT obtained from a client id/secret header pair).

pub mod client;
pub mod service;
pub mod wire;

use consign_shared::pii::Masked;
use serde::Deserialize;

use crate::http::default_timeout_secs;

pub use client::BlueDartClient;
pub use service::BlueDartService;

#[derive(Debug, Clone, Deserialize)]
pub struct BlueDartConfig {
    pub base_url: String,
    pub client_id: Masked<String>,
    pub client_secret: Masked<String>,
    pub login_id: String,
    pub licence_key: Masked<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_type")]
    pub api_type: String,
    #[serde(default = "default_product_code")]
    pub product_code: String,
    #[serde(default = "default_sub_product_code")]
    pub sub_product_code: String,
    #[serde(default = "default_pickup_sub_products")]
    pub pickup_sub_products: Vec<String>,
}

fn default_api_type() -> String { "S".to_string() }
fn default_product_code() -> String { "A".to_string() }
fn default_sub_product_code() -> String { "P".to_string() }
fn default_pickup_sub_products() -> Vec<String> { vec!["E-Tailing".to_string()] }

impl BlueDartConfig {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str, login_id: &str, licence_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            login_id: login_id.to_string(),
            licence_key: licence_key.into(),
            timeout_secs: default_timeout_secs(),
            api_type: default_api_type(),
            product_code: default_product_code(),
            sub_product_code: default_sub_product_code(),
            pickup_sub_products: default_pickup_sub_products(),
        }
    }
}
