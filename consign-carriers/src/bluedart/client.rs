use std::time::Duration;

use consign_core::{AuthToken, CarrierError};
use serde_json::Value;

use super::BlueDartConfig;
use crate::http::{build_client, endpoint, endpoint_with_params, transport_error, RawResponse};

pub const LOGIN_PATH: &str = "/in/transportation/token/v1/login";
pub const REGISTER_PICKUP_PATH: &str = "/in/transportation/pickup/v1/RegisterPickup";
pub const CANCEL_PICKUP_PATH: &str = "/in/transportation/cancel-pickup/v1/CancelPickup";
pub const GENERATE_WAYBILL_PATH: &str = "/in/transportation/waybill/v1/GenerateWayBill";
pub const IMPORT_WAYBILLS_PATH: &str = "/in/transportation/waybill/v1/ImportData";
pub const TRACKING_PATH: &str = "/in/transportation/tracking/v1/shipment";
pub const SERVICEABILITY_PATH: &str = "/in/transportation/finder/v1/GetServicesforPincode";

/// Raw authenticated HTTP access to the domestic carrier.
pub struct BlueDartClient {
    http: reqwest::Client,
    config: BlueDartConfig,
}

impl BlueDartClient {
    pub fn new(config: BlueDartConfig) -> Result<Self, CarrierError> {
        let http = build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &BlueDartConfig {
        &self.config
    }

    /// GET the login endpoint with the client id/secret headers
    pub async fn login(&self) -> Result<RawResponse, CarrierError> {
        let response = self
            .http
            .get(endpoint(&self.config.base_url, LOGIN_PATH))
            .header("ClientID", self.config.client_id.expose().as_str())
            .header("clientSecret", self.config.client_secret.expose().as_str())
            .send()
            .await
            .map_err(transport_error)?;
        RawResponse::read(response).await
    }

    /// POST a JSON envelope with the JWT in the `JWTToken` header
    pub async fn post(&self, path: &str, token: &AuthToken, body: &Value) -> Result<RawResponse, CarrierError> {
        let response = self
            .http
            .post(endpoint(&self.config.base_url, path))
            .header("JWTToken", token.expose())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        RawResponse::read(response).await
    }

    pub async fn get(
        &self,
        path: &str,
        token: &AuthToken,
        params: &[(&str, String)],
    ) -> Result<RawResponse, CarrierError> {
        let url = endpoint_with_params(&self.config.base_url, path, params)?;
        let response = self
            .http
            .get(url)
            .header("JWTToken", token.expose())
            .send()
            .await
            .map_err(transport_error)?;
        RawResponse::read(response).await
    }
}
