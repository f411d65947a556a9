use async_trait::async_trait;
use chrono::Utc;
use consign_core::{
    AuthToken, CancelPickupRequest, CarrierCall, CarrierError, CarrierResult, CourierCode,
    PickupCancellation, PickupConfirmation, PickupRequest, RateQuery, RateQuote, Serviceability,
    ShipmentConfirmation, ShipmentRequest, ShippingProvider, TrackingSnapshot, Waybill,
    WaybillRequest,
};
use serde_json::Value;
use tracing::{info, warn};

use super::client::{DhlClient, ADDRESS_VALIDATE_PATH, PICKUPS_PATH, RATES_PATH, SHIPMENTS_PATH};
use super::wire::{self, interpret, required_str, ShipmentParts};
use super::DhlConfig;

const DEFAULT_SHIP_TIME: &str = "1400";
/// Placeholder AWB used by the health probe
const HEALTH_PROBE_AWB: &str = "0000000000";

pub struct DhlService {
    client: DhlClient,
}

impl DhlService {
    pub fn new(config: DhlConfig) -> Result<Self, CarrierError> {
        Ok(Self {
            client: DhlClient::new(config)?,
        })
    }

    async fn book(&self, token: &AuthToken, parts: &ShipmentParts<'_>) -> CarrierCall<Value> {
        let body = wire::shipment_body(self.client.config(), parts);
        let raw = self.client.post(SHIPMENTS_PATH, token, &body).await?;
        interpret(&raw, |body| {
            required_str(body, "/shipmentTrackingNumber")?;
            Ok(body.clone())
        })
    }
}

fn label_url(body: &Value) -> Option<String> {
    body.pointer("/documents/0/url")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ShippingProvider for DhlService {
    fn code(&self) -> CourierCode {
        CourierCode::Dhl
    }

    async fn authenticate(&self) -> Result<AuthToken, CarrierError> {
        self.client.basic_auth()
    }

    async fn create_shipment(
        &self,
        token: &AuthToken,
        request: &ShipmentRequest,
    ) -> CarrierCall<ShipmentConfirmation> {
        request.validate()?;
        let parts = ShipmentParts {
            shipper: &request.sender,
            receiver: &request.receiver,
            package: &request.package,
            service: request.service,
            reference: &request.reference,
            ship_date: Utc::now().date_naive(),
            ship_time: DEFAULT_SHIP_TIME,
        };
        let result = self.book(token, &parts).await?;
        Ok(result.map(|body| ShipmentConfirmation {
            tracking_number: required_str(&body, "/shipmentTrackingNumber").unwrap_or_default(),
            status: "Created".to_string(),
            label_url: label_url(&body),
            raw: body,
        }))
    }

    async fn register_pickup(
        &self,
        token: &AuthToken,
        request: &PickupRequest,
    ) -> CarrierCall<PickupConfirmation> {
        request.validate()?;
        let body = wire::pickup_body(self.client.config(), request);
        let raw = self.client.post(PICKUPS_PATH, token, &body).await?;

        interpret(&raw, |body| {
            let token_number = required_str(body, "/dispatchConfirmationNumbers/0")?;
            info!("DHL pickup {} registered for {}", token_number, request.reference);
            Ok(PickupConfirmation {
                token_number,
                status: "Registered".to_string(),
                pickup_date: request.pickup_date,
                pickup_time: request.pickup_time.clone(),
                raw: body.clone(),
            })
        })
    }

    async fn cancel_pickup(
        &self,
        token: &AuthToken,
        request: &CancelPickupRequest,
    ) -> CarrierCall<PickupCancellation> {
        let pickup_token = request.pickup_token.trim();
        if pickup_token.is_empty() {
            return Err(CarrierError::Validation("pickup token is required".to_string()));
        }
        let path = format!("{}/{}", PICKUPS_PATH, pickup_token);
        let params = [
            ("requestorName", self.client.config().requestor_name.clone()),
            ("reason", request.reason.clone()),
        ];
        let raw = self.client.delete(&path, token, &params).await?;

        interpret(&raw, |body| {
            Ok(PickupCancellation {
                status: "Cancelled".to_string(),
                raw: body.clone(),
            })
        })
    }

    async fn generate_waybill(&self, token: &AuthToken, request: &WaybillRequest) -> CarrierCall<Waybill> {
        request.validate()?;
        if request.collectable_amount > 0.0 {
            warn!(
                "DHL does not collect cash on delivery; {} not collected for {}",
                request.collectable_amount, request.reference
            );
        }
        let parts = ShipmentParts {
            shipper: &request.shipper,
            receiver: &request.consignee,
            package: &request.package,
            service: request.service,
            reference: &request.reference,
            ship_date: request.pickup_date,
            ship_time: &request.pickup_time,
        };
        let result = self.book(token, &parts).await?;
        Ok(result.map(|body| Waybill {
            awb_number: required_str(&body, "/shipmentTrackingNumber").unwrap_or_default(),
            status: "Generated".to_string(),
            destination_area: body
                .pointer("/shipmentDetails/0/serviceArea/0/code")
                .and_then(Value::as_str)
                .map(str::to_string),
            destination_location: body
                .pointer("/shipmentDetails/0/serviceArea/0/description")
                .and_then(Value::as_str)
                .map(str::to_string),
            raw: body,
        }))
    }

    async fn track_shipment(&self, identifier: &str) -> Result<TrackingSnapshot, CarrierError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(CarrierError::Validation("tracking number is required".to_string()));
        }
        let raw = self.client.track(identifier).await?;
        if raw.is_auth_failure() {
            return Err(CarrierError::Authentication(format!("tracking rejected with HTTP {}", raw.status)));
        }
        if raw.is_server_error() {
            return Err(raw.server_error());
        }
        if !raw.is_success() {
            return Err(CarrierError::Tracking(format!(
                "tracking lookup for {} failed with HTTP {}",
                identifier, raw.status
            )));
        }
        wire::decode_tracking(identifier, &raw.body)
    }

    async fn check_serviceability(
        &self,
        token: &AuthToken,
        pincode: &str,
        country: &str,
    ) -> CarrierCall<Serviceability> {
        let pincode = pincode.trim();
        if pincode.is_empty() {
            return Err(CarrierError::Validation("pincode is required".to_string()));
        }
        let params = [
            ("type", "delivery".to_string()),
            ("countryCode", country.to_uppercase()),
            ("postalCode", pincode.to_string()),
        ];
        let raw = self.client.get(ADDRESS_VALIDATE_PATH, token, &params).await?;

        // Unknown postal codes come back as 400/404 problem details.
        if raw.status == 400 || raw.status == 404 {
            let details = raw.details();
            return Ok(CarrierResult::Success(Serviceability {
                pincode: pincode.to_string(),
                serviceable: false,
                area_code: None,
                description: Some(wire::error_message(&details)),
                services: Vec::new(),
            }));
        }

        interpret(&raw, |body| {
            let first = body.pointer("/address/0");
            Ok(Serviceability {
                pincode: pincode.to_string(),
                serviceable: first.is_some(),
                area_code: first
                    .and_then(|a| a.pointer("/serviceArea/code"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                description: first
                    .and_then(|a| a.get("cityName"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                services: Vec::new(),
            })
        })
    }

    async fn calculate_rates(&self, token: &AuthToken, query: &RateQuery) -> CarrierCall<Vec<RateQuote>> {
        query.validate()?;
        let params = wire::rate_params(self.client.config(), query);
        let raw = self.client.get(RATES_PATH, token, &params).await?;
        interpret(&raw, wire::decode_rates)
    }

    async fn check_health(&self) -> bool {
        match self.client.track(HEALTH_PROBE_AWB).await {
            Ok(_) => true,
            Err(e) => {
                warn!("DHL health probe failed: {}", e);
                false
            }
        }
    }
}
