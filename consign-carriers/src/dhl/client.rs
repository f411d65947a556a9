use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use consign_core::{AuthToken, CarrierError};
use serde_json::Value;
use tracing::warn;

use super::{CredentialPlacement, DhlConfig};
use crate::http::{build_client, endpoint, endpoint_with_params, transport_error, RawResponse};

pub const SHIPMENTS_PATH: &str = "/shipments";
pub const PICKUPS_PATH: &str = "/pickups";
pub const RATES_PATH: &str = "/rates";
pub const ADDRESS_VALIDATE_PATH: &str = "/address-validate";
pub const TRACKING_SERVLET_PATH: &str = "/servlet/RoutingServlet";

pub struct DhlClient {
    http: reqwest::Client,
    config: DhlConfig,
}

impl DhlClient {
    pub fn new(config: DhlConfig) -> Result<Self, CarrierError> {
        let http = build_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &DhlConfig {
        &self.config
    }

    /// `Basic base64(key:secret)`, built locally.
    pub fn basic_auth(&self) -> Result<AuthToken, CarrierError> {
        let key = self.config.api_key.expose();
        let secret = self.config.api_secret.expose();
        if key.is_empty() || secret.is_empty() {
            return Err(CarrierError::Authentication("API key and secret are required".to_string()));
        }
        let encoded = STANDARD.encode(format!("{}:{}", key, secret));
        Ok(AuthToken::new(format!("Basic {}", encoded)))
    }

    pub async fn post(&self, path: &str, token: &AuthToken, body: &Value) -> Result<RawResponse, CarrierError> {
        let response = self
            .http
            .post(endpoint(&self.config.base_url, path))
            .header("Authorization", token.expose())
            .header("Accept", "application/json")
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
            .header("Authorization", token.expose())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        RawResponse::read(response).await
    }

    pub async fn delete(
        &self,
        path: &str,
        token: &AuthToken,
        params: &[(&str, String)],
    ) -> Result<RawResponse, CarrierError> {
        let url = endpoint_with_params(&self.config.base_url, path, params)?;
        let response = self
            .http
            .delete(url)
            .header("Authorization", token.expose())
            .send()
            .await
            .map_err(transport_error)?;
        RawResponse::read(response).await
    }

    /// Query the XML tracking servlet for one or more comma-separated AWBs.
    pub async fn track(&self, numbers: &str) -> Result<RawResponse, CarrierError> {
        let mut params = vec![
            ("handler", "tnt".to_string()),
            ("action", "custawbquery".to_string()),
            ("awb", "awb".to_string()),
            ("numbers", numbers.to_string()),
            ("format", "xml".to_string()),
            ("verno", "1.3".to_string()),
            ("scan", "1".to_string()),
        ];
        if self.config.credential_placement == CredentialPlacement::Query {
            warn!("DHL tracking credentials sent as query parameters (legacy placement)");
            params.push(("loginid", self.config.login_id.clone()));
            params.push(("lickey", self.config.licence_key.expose().clone()));
        }

        let url = endpoint_with_params(&self.config.tracking_base_url, TRACKING_SERVLET_PATH, &params)?;
        let mut request = self.http.get(url).header("Accept", "application/xml");
        if self.config.credential_placement == CredentialPlacement::Header {
            request = request
                .header("X-Login-Id", self.config.login_id.as_str())
                .header("X-Licence-Key", self.config.licence_key.expose().as_str());
        }
        let response = request.send().await.map_err(transport_error)?;
        RawResponse::read(response).await
    }
}
