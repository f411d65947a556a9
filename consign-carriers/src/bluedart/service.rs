use async_trait::async_trait;
use chrono::Utc;
use consign_core::{
    AuthToken, CancelPickupRequest, CarrierCall, CarrierError, CarrierRejection, CarrierResult,
    CourierCode, PickupCancellation, PickupConfirmation, PickupRequest, Serviceability,
    ShipmentConfirmation, ShipmentRequest, ShippingProvider, TrackingSnapshot, Waybill,
    WaybillRequest,
};
use serde_json::Value;
use tracing::{info, warn};

use super::client::{
    BlueDartClient, CANCEL_PICKUP_PATH, GENERATE_WAYBILL_PATH, IMPORT_WAYBILLS_PATH,
    REGISTER_PICKUP_PATH, SERVICEABILITY_PATH, TRACKING_PATH,
};
use super::wire::{self, decode_result, first_status_code, interpret, string_field};
use super::BlueDartConfig;

const DOMESTIC_COUNTRY: &str = "IN";
const DEFAULT_PICKUP_TIME: &str = "1400";

pub struct BlueDartService {
    client: BlueDartClient,
}

impl BlueDartService {
    pub fn new(config: BlueDartConfig) -> Result<Self, CarrierError> {
        Ok(Self {
            client: BlueDartClient::new(config)?,
        })
    }

    fn config(&self) -> &BlueDartConfig {
        self.client.config()
    }
}

fn decode_waybill(result: &Value, status: u16) -> CarrierResult<Waybill> {
    decode_result(result, status, |r| {
        let awb = string_field(r, "AWBNo").ok_or_else(|| {
            CarrierRejection::new("waybill response carried no AWB number", r.clone(), Some(status))
        })?;
        Ok(Waybill {
            awb_number: awb,
            status: first_status_code(r).unwrap_or_else(|| "Generated".to_string()),
            destination_area: string_field(r, "DestinationArea"),
            destination_location: string_field(r, "DestinationLocation"),
            raw: r.clone(),
        })
    })
}

/// Services flagged `...Inbound: "Yes"` in a pincode lookup.
fn inbound_services(result: &Value) -> Vec<String> {
    let mut services: Vec<String> = result
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| v.as_str().map(|s| s.eq_ignore_ascii_case("yes")).unwrap_or(false))
                .filter_map(|(k, _)| k.strip_suffix("Inbound").map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    services.sort();
    services
}

#[async_trait]
impl ShippingProvider for BlueDartService {
    fn code(&self) -> CourierCode {
        CourierCode::BlueDart
    }

    async fn authenticate(&self) -> Result<AuthToken, CarrierError> {
        let raw = self.client.login().await?;
        if raw.is_server_error() {
            return Err(raw.server_error());
        }
        if !raw.is_success() {
            return Err(CarrierError::Authentication(format!(
                "login rejected with HTTP {}",
                raw.status
            )));
        }
        let body = raw.json()?;
        let token = body
            .get("JWTToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CarrierError::Authentication("login response carried no JWTToken".to_string()))?;
        Ok(AuthToken::new(token))
    }

    /// Shipments are booked as a waybill generated for today.
    async fn create_shipment(
        &self,
        token: &AuthToken,
        request: &ShipmentRequest,
    ) -> CarrierCall<ShipmentConfirmation> {
        request.validate()?;
        let waybill = WaybillRequest {
            shipper: request.sender.clone(),
            consignee: request.receiver.clone(),
            package: request.package.clone(),
            service: request.service,
            reference: request.reference.clone(),
            pickup_date: Utc::now().date_naive(),
            pickup_time: DEFAULT_PICKUP_TIME.to_string(),
            collectable_amount: 0.0,
        };
        let result = self.generate_waybill(token, &waybill).await?;
        Ok(result.map(|w| ShipmentConfirmation {
            tracking_number: w.awb_number,
            status: w.status,
            label_url: None,
            raw: w.raw,
        }))
    }

    async fn register_pickup(
        &self,
        token: &AuthToken,
        request: &PickupRequest,
    ) -> CarrierCall<PickupConfirmation> {
        request.validate()?;
        let body = wire::pickup_body(self.config(), request);
        let raw = self.client.post(REGISTER_PICKUP_PATH, token, &body).await?;

        interpret(&raw, "RegisterPickupResult", |result, status| {
            decode_result(result, status, |r| {
                let token_number = string_field(r, "TokenNumber").ok_or_else(|| {
                    CarrierRejection::new("pickup registered without a token number", r.clone(), Some(status))
                })?;
                info!("Blue Dart pickup {} registered for {}", token_number, request.reference);
                Ok(PickupConfirmation {
                    token_number,
                    status: first_status_code(r).unwrap_or_else(|| "Registered".to_string()),
                    pickup_date: request.pickup_date,
                    pickup_time: request.pickup_time.clone(),
                    raw: r.clone(),
                })
            })
        })
    }

    async fn cancel_pickup(
        &self,
        token: &AuthToken,
        request: &CancelPickupRequest,
    ) -> CarrierCall<PickupCancellation> {
        if request.pickup_token.trim().is_empty() {
            return Err(CarrierError::Validation("pickup token is required".to_string()));
        }
        let body = wire::cancel_body(self.config(), request);
        let raw = self.client.post(CANCEL_PICKUP_PATH, token, &body).await?;

        interpret(&raw, "CancelPickupResult", |result, status| {
            decode_result(result, status, |r| {
                Ok(PickupCancellation {
                    status: first_status_code(r).unwrap_or_else(|| "Cancelled".to_string()),
                    raw: r.clone(),
                })
            })
        })
    }

    async fn generate_waybill(&self, token: &AuthToken, request: &WaybillRequest) -> CarrierCall<Waybill> {
        request.validate()?;
        let body = wire::waybill_body(self.config(), request);
        let raw = self.client.post(GENERATE_WAYBILL_PATH, token, &body).await?;
        interpret(&raw, "GenerateWayBillResult", decode_waybill)
    }

    async fn generate_waybills(
        &self,
        token: &AuthToken,
        requests: &[WaybillRequest],
    ) -> Result<Vec<CarrierResult<Waybill>>, CarrierError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        for request in requests {
            request.validate()?;
        }
        let body = wire::bulk_waybill_body(self.config(), requests);
        let raw = self.client.post(IMPORT_WAYBILLS_PATH, token, &body).await?;

        let batch = interpret(&raw, "ImportDataResult", |result, status| {
            CarrierResult::Success((result.clone(), status))
        })?;
        match batch {
            CarrierResult::Rejected(rejection) => {
                Ok(requests.iter().map(|_| CarrierResult::Rejected(rejection.clone())).collect())
            }
            CarrierResult::Success((result, status)) => {
                let items = result
                    .as_array()
                    .ok_or_else(|| CarrierError::Parse("ImportDataResult is not a list".to_string()))?;
                if items.len() != requests.len() {
                    warn!(
                        "Blue Dart bulk waybill returned {} results for {} requests",
                        items.len(),
                        requests.len()
                    );
                }
                Ok(items.iter().map(|item| decode_waybill(item, status)).collect())
            }
        }
    }

    async fn track_shipment(&self, identifier: &str) -> Result<TrackingSnapshot, CarrierError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(CarrierError::Validation("tracking number is required".to_string()));
        }
        let token = self.authenticate().await?;
        let raw = self
            .client
            .get(TRACKING_PATH, &token, &[("awb", identifier.to_string())])
            .await?;

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
        if !country.eq_ignore_ascii_case(DOMESTIC_COUNTRY) {
            return Ok(CarrierResult::Success(Serviceability {
                pincode: pincode.to_string(),
                serviceable: false,
                area_code: None,
                description: Some(format!("Blue Dart does not deliver to {}", country)),
                services: Vec::new(),
            }));
        }

        let body = wire::serviceability_body(self.config(), pincode);
        let raw = self.client.post(SERVICEABILITY_PATH, token, &body).await?;

        interpret(&raw, "GetServicesforPincodeResult", |result, _| {
            let is_error = result.get("IsError").and_then(Value::as_bool).unwrap_or(false);
            let description = if is_error {
                string_field(result, "ErrorMessage")
            } else {
                string_field(result, "PincodeDescription")
            };
            CarrierResult::Success(Serviceability {
                pincode: pincode.to_string(),
                serviceable: !is_error,
                area_code: string_field(result, "AreaCode"),
                description,
                services: if is_error { Vec::new() } else { inbound_services(result) },
            })
        })
    }

    async fn check_health(&self) -> bool {
        match self.client.login().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Blue Dart health probe failed: {}", e);
                false
            }
        }
    }
}
