//! Request envelopes and response decoding for the domestic carrier.
//!
//! Every call carries a `profile` block (API type, licence key, login id) next
//! to the `request` block; field names below are the carrier's, verbatim.

use chrono::Utc;
use consign_core::{
    CancelPickupRequest, CarrierCall, CarrierError, CarrierRejection, CarrierResult, PickupRequest,
    TrackingEvent, TrackingSnapshot, WaybillRequest, CourierCode,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::BlueDartConfig;
use crate::dates::{parse_carrier_date, parse_carrier_datetime, to_wcf_date};
use crate::http::RawResponse;

pub fn profile(config: &BlueDartConfig) -> Value {
    json!({
        "Api_type": config.api_type,
        "LicenceKey": config.licence_key.expose(),
        "LoginID": config.login_id,
    })
}

fn line(lines: &[&str], idx: usize) -> String {
    lines.get(idx).map(|l| l.to_string()).unwrap_or_default()
}

pub fn pickup_body(config: &BlueDartConfig, request: &PickupRequest) -> Value {
    let sender = &request.sender;
    let lines = sender.lines();
    json!({
        "request": {
            "AreaCode": sender.area_code,
            "ContactPersonName": sender.contact_name,
            "CustomerAddress1": line(&lines, 0),
            "CustomerAddress2": line(&lines, 1),
            "CustomerAddress3": line(&lines, 2),
            "CustomerCode": sender.customer_code,
            "CustomerName": sender.company,
            "CustomerPincode": sender.pincode,
            "CustomerTelephoneNumber": sender.phone,
            "EmailID": sender.email.clone().unwrap_or_default(),
            "MobileTelNo": sender.mobile.clone().unwrap_or_else(|| sender.phone.clone()),
            "NumberofPieces": request.pieces,
            "OfficeCloseTime": request.office_close_time,
            "ProductCode": config.product_code,
            "ReferenceNo": request.reference,
            "Remarks": request.remarks.clone().unwrap_or_default(),
            "RouteCode": "",
            "ShipmentPickupDate": to_wcf_date(request.pickup_date),
            "ShipmentPickupTime": request.pickup_time,
            "SubProducts": config.pickup_sub_products,
            "VolumeWeight": 0,
            "WeightofShipment": request.weight_kg,
            "isToPayShipper": false,
            "IsForcePickup": false,
            "IsReversePickup": false,
        },
        "profile": profile(config),
    })
}

pub fn cancel_body(config: &BlueDartConfig, request: &CancelPickupRequest) -> Value {
    json!({
        "request": {
            "TokenNumber": request.pickup_token,
            "PickupRegistrationDate": to_wcf_date(request.registration_date),
            "Remarks": request.reason,
        },
        "profile": profile(config),
    })
}

/// The inner `Request` block of a waybill call
pub fn waybill_request(config: &BlueDartConfig, request: &WaybillRequest) -> Value {
    let consignee = &request.consignee;
    let consignee_lines = consignee.lines();
    let shipper = &request.shipper;
    let shipper_lines = shipper.lines();
    json!({
        "Consignee": {
            "ConsigneeName": consignee.name,
            "ConsigneeAttention": consignee.name,
            "ConsigneeAddress1": line(&consignee_lines, 0),
            "ConsigneeAddress2": line(&consignee_lines, 1),
            "ConsigneeAddress3": line(&consignee_lines, 2),
            "ConsigneePincode": consignee.pincode,
            "ConsigneeMobile": consignee.phone,
            "ConsigneeTelephone": consignee.phone,
            "ConsigneeEmailID": consignee.email.clone().unwrap_or_default(),
        },
        "Services": {
            "ProductCode": config.product_code,
            "SubProductCode": if request.collectable_amount > 0.0 { "C".to_string() } else { config.sub_product_code.clone() },
            "ActualWeight": request.package.weight_kg,
            "PieceCount": request.package.pieces,
            "ItemCount": request.package.pieces,
            "DeclaredValue": request.package.declared_value,
            "CollectableAmount": request.collectable_amount,
            "CreditReferenceNo": request.reference,
            "PickupDate": to_wcf_date(request.pickup_date),
            "PickupTime": request.pickup_time,
            "RegisterPickup": false,
            "Commodity": { "CommodityDetail1": request.package.description },
            "Dimensions": [],
        },
        "Shipper": {
            "CustomerCode": shipper.customer_code,
            "CustomerName": shipper.company,
            "CustomerAddress1": line(&shipper_lines, 0),
            "CustomerAddress2": line(&shipper_lines, 1),
            "CustomerAddress3": line(&shipper_lines, 2),
            "CustomerPincode": shipper.pincode,
            "CustomerMobile": shipper.mobile.clone().unwrap_or_else(|| shipper.phone.clone()),
            "CustomerTelephone": shipper.phone,
            "CustomerEmailID": shipper.email.clone().unwrap_or_default(),
            "OriginArea": shipper.area_code,
            "Sender": shipper.contact_name,
            "IsToPayCustomer": false,
        },
    })
}

pub fn waybill_body(config: &BlueDartConfig, request: &WaybillRequest) -> Value {
    json!({
        "Request": waybill_request(config, request),
        "Profile": profile(config),
    })
}

pub fn bulk_waybill_body(config: &BlueDartConfig, requests: &[WaybillRequest]) -> Value {
    let batch: Vec<Value> = requests.iter().map(|r| waybill_request(config, r)).collect();
    json!({
        "Request": batch,
        "Profile": profile(config),
    })
}

pub fn serviceability_body(config: &BlueDartConfig, pincode: &str) -> Value {
    json!({
        "pinCode": pincode,
        "profile": profile(config),
    })
}

/// Human-readable message from whatever status shape the carrier returned.
pub fn status_message(value: &Value) -> Option<String> {
    let statuses = value
        .get("Status")
        .or_else(|| value.pointer("/error-response/0/Status"))
        .and_then(Value::as_array)?;
    let messages: Vec<&str> = statuses
        .iter()
        .filter_map(|s| s.get("StatusInformation").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

pub fn first_status_code(value: &Value) -> Option<String> {
    value
        .pointer("/Status/0/StatusCode")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn fallback_message(value: &Value) -> String {
    status_message(value)
        .or_else(|| value.get("ErrorMessage").and_then(Value::as_str).map(str::to_string))
        .or_else(|| value.get("title").and_then(Value::as_str).map(str::to_string))
        .or_else(|| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "carrier rejected the request".to_string())
}

/// Token numbers and AWBs come back as strings or bare numbers.
pub fn string_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret one `<Operation>Result` payload that carries an `IsError` flag.
pub fn decode_result<T>(
    result: &Value,
    status: u16,
    on_success: impl FnOnce(&Value) -> Result<T, CarrierRejection>,
) -> CarrierResult<T> {
    if result.get("IsError").and_then(Value::as_bool).unwrap_or(false) {
        return CarrierResult::Rejected(CarrierRejection::new(
            fallback_message(result),
            result.clone(),
            Some(status),
        ));
    }
    match on_success(result) {
        Ok(value) => CarrierResult::Success(value),
        Err(rejection) => CarrierResult::Rejected(rejection),
    }
}

/// Classify an HTTP response and hand the named result block to `decode`.
pub fn interpret<T>(
    raw: &RawResponse,
    result_key: &str,
    decode: impl FnOnce(&Value, u16) -> CarrierResult<T>,
) -> CarrierCall<T> {
    if raw.is_auth_failure() {
        return Err(CarrierError::Authentication(fallback_message(&raw.details())));
    }
    if raw.is_server_error() {
        return Err(raw.server_error());
    }
    let body = raw.json()?;
    if !raw.is_success() {
        return Ok(CarrierResult::Rejected(CarrierRejection::new(
            fallback_message(&body),
            body,
            Some(raw.status),
        )));
    }
    let result = body
        .get(result_key)
        .ok_or_else(|| CarrierError::Parse(format!("missing {} in response", result_key)))?;
    Ok(decode(result, raw.status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackingEnvelope {
    shipment_data: TrackingData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackingData {
    #[serde(default)]
    shipment: Vec<TrackedShipment>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackedShipment {
    waybill_no: Option<String>,
    status: Option<String>,
    status_type: Option<String>,
    expected_delivery_date: Option<String>,
    #[serde(default)]
    scans: Vec<ScanWrapper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanWrapper {
    scan_detail: ScanDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScanDetail {
    scan: Option<String>,
    scan_code: Option<String>,
    scan_date: Option<String>,
    scan_time: Option<String>,
    scanned_location: Option<String>,
}

/// Decode a tracking response body into a live snapshot
pub fn decode_tracking(identifier: &str, body: &str) -> Result<TrackingSnapshot, CarrierError> {
    let envelope: TrackingEnvelope = serde_json::from_str(body)
        .map_err(|e| CarrierError::Parse(format!("invalid tracking response: {}", e)))?;
    let data = envelope.shipment_data;
    if let Some(error) = data.error.filter(|e| !e.trim().is_empty()) {
        return Err(CarrierError::Tracking(error));
    }
    let shipment = data
        .shipment
        .into_iter()
        .next()
        .ok_or_else(|| CarrierError::Tracking(format!("no shipment found for {}", identifier)))?;
    if shipment.status_type.as_deref() == Some("NF") {
        return Err(CarrierError::Tracking(
            shipment.status.unwrap_or_else(|| format!("no shipment found for {}", identifier)),
        ));
    }

    let mut snapshot = TrackingSnapshot::live(
        shipment.waybill_no.unwrap_or_else(|| identifier.to_string()),
        CourierCode::BlueDart,
        shipment.status.unwrap_or_else(|| "UNKNOWN".to_string()),
    );
    snapshot.estimated_delivery = shipment.expected_delivery_date.as_deref().and_then(parse_carrier_date);
    snapshot.events = shipment
        .scans
        .into_iter()
        .map(|w| w.scan_detail)
        .map(|scan| TrackingEvent {
            timestamp: scan
                .scan_date
                .as_deref()
                .and_then(|d| parse_carrier_datetime(d, scan.scan_time.as_deref())),
            status_code: scan.scan_code.unwrap_or_default(),
            description: scan.scan.unwrap_or_default(),
            location: scan.scanned_location,
        })
        .collect();
    snapshot.sort_events();
    snapshot.last_refreshed = Utc::now();
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use consign_core::SenderProfile;

    fn config() -> BlueDartConfig {
        BlueDartConfig::new("http://localhost", "cid", "secret", "BLR00001", "lic-123")
    }

    #[test]
    fn test_pickup_body_uses_carrier_field_names() {
        let request = PickupRequest {
            reference: "ORD-1001".to_string(),
            sender: SenderProfile {
                contact_name: "Dock Manager".to_string(),
                company: "Acme Retail".to_string(),
                line1: "Plot 7".to_string(),
                line2: Some("MIDC".to_string()),
                pincode: "400093".to_string(),
                phone: "02240000000".to_string(),
                area_code: "BOM".to_string(),
                customer_code: "099960".to_string(),
                ..Default::default()
            },
            pieces: 3,
            weight_kg: 1.5,
            declared_value: 1500.0,
            pickup_date: NaiveDate::from_ymd_opt(2024, 10, 12).unwrap(),
            pickup_time: "1400".to_string(),
            office_close_time: "1800".to_string(),
            remarks: None,
        };

        let body = pickup_body(&config(), &request);

        assert_eq!(body["profile"]["LoginID"], "BLR00001");
        assert_eq!(body["profile"]["LicenceKey"], "lic-123");
        assert_eq!(body["request"]["ProductCode"], "A");
        assert_eq!(body["request"]["SubProducts"][0], "E-Tailing");
        assert_eq!(body["request"]["CustomerAddress2"], "MIDC");
        assert_eq!(body["request"]["CustomerAddress3"], "");
        assert_eq!(body["request"]["NumberofPieces"], 3);
        assert_eq!(body["request"]["ShipmentPickupDate"], "/Date(1728691200000)/");
        assert_eq!(body["request"]["MobileTelNo"], "02240000000");
    }

    #[test]
    fn test_decode_result_surfaces_carrier_errors() {
        let result = json!({
            "IsError": true,
            "Status": [
                {"StatusCode": "InvalidPincode", "StatusInformation": "Pincode not serviceable"},
                {"StatusCode": "Weight", "StatusInformation": "Weight exceeds limit"}
            ]
        });

        let decoded: CarrierResult<()> = decode_result(&result, 200, |_| Ok(()));
        match decoded {
            CarrierResult::Rejected(rejection) => {
                assert_eq!(rejection.message, "Pincode not serviceable; Weight exceeds limit");
                assert_eq!(rejection.provider_status_code, Some(200));
                assert_eq!(rejection.details["Status"][0]["StatusCode"], "InvalidPincode");
            }
            CarrierResult::Success(_) => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_interpret_error_response_envelope() {
        let raw = RawResponse {
            status: 400,
            body: json!({
                "error-response": [{"Status": [{"StatusCode": "E1", "StatusInformation": "Invalid AreaCode"}]}]
            })
            .to_string(),
        };

        let call: CarrierCall<()> = interpret(&raw, "RegisterPickupResult", |_, _| CarrierResult::Success(()));
        match call {
            Ok(CarrierResult::Rejected(rejection)) => {
                assert_eq!(rejection.message, "Invalid AreaCode");
                assert_eq!(rejection.provider_status_code, Some(400));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_interpret_unauthorized_is_auth_error() {
        let raw = RawResponse { status: 401, body: "{\"title\":\"Token expired\"}".to_string() };
        let call: CarrierCall<()> = interpret(&raw, "X", |_, _| CarrierResult::Success(()));
        assert!(matches!(call, Err(CarrierError::Authentication(msg)) if msg == "Token expired"));
    }

    #[test]
    fn test_decode_tracking_orders_scans() {
        let body = json!({
            "ShipmentData": {
                "Shipment": [{
                    "WaybillNo": "50012345678",
                    "Status": "IN TRANSIT",
                    "StatusType": "UD",
                    "ExpectedDeliveryDate": "14-Oct-2024",
                    "Scans": [
                        {"ScanDetail": {"Scan": "Shipment picked up", "ScanCode": "015", "ScanDate": "11-Oct-2024", "ScanTime": "1010", "ScannedLocation": "MUMBAI"}},
                        {"ScanDetail": {"Scan": "Arrived at hub", "ScanCode": "001", "ScanDate": "12-Oct-2024", "ScanTime": "0630", "ScannedLocation": "BANGALORE HUB"}}
                    ]
                }]
            }
        })
        .to_string();

        let snapshot = decode_tracking("50012345678", &body).unwrap();

        assert_eq!(snapshot.status, "IN TRANSIT");
        assert_eq!(snapshot.courier, Some(CourierCode::BlueDart));
        assert_eq!(snapshot.events.len(), 2);
        assert_eq!(snapshot.events[0].location.as_deref(), Some("BANGALORE HUB"));
        assert_eq!(snapshot.estimated_delivery, NaiveDate::from_ymd_opt(2024, 10, 14));
        assert!(!snapshot.is_degraded());
    }

    #[test]
    fn test_decode_tracking_not_found() {
        let body = json!({"ShipmentData": {"Shipment": [{"WaybillNo": "1", "StatusType": "NF", "Status": "No such waybill"}]}}).to_string();
        let err = decode_tracking("1", &body).unwrap_err();
        assert!(matches!(err, CarrierError::Tracking(msg) if msg == "No such waybill"));
    }
}
