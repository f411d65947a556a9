use chrono::{NaiveDate, Utc};
use consign_core::{
    CarrierCall, CarrierError, CarrierRejection, CarrierResult, ContactAddress, CourierCode,
    PackageDetails, PickupRequest, RateQuery, RateQuote, SenderProfile, ServiceLevel, TrackingEvent,
    TrackingSnapshot,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::DhlConfig;
use crate::dates::{hhmm_to_colon, parse_carrier_date, parse_carrier_datetime, to_gmt_timestamp};
use crate::http::RawResponse;

fn shipper_details(sender: &SenderProfile) -> Value {
    json!({
        "postalAddress": {
            "postalCode": sender.pincode,
            "cityName": sender.city,
            "countryCode": sender.country,
            "addressLine1": sender.line1,
            "addressLine2": sender.line2.clone().unwrap_or_default(),
            "addressLine3": sender.line3.clone().unwrap_or_default(),
        },
        "contactInformation": {
            "phone": sender.phone,
            "mobilePhone": sender.mobile.clone().unwrap_or_else(|| sender.phone.clone()),
            "companyName": sender.company,
            "fullName": sender.contact_name,
            "email": sender.email.clone().unwrap_or_default(),
        },
    })
}

fn receiver_details(receiver: &ContactAddress) -> Value {
    json!({
        "postalAddress": {
            "postalCode": receiver.pincode,
            "cityName": receiver.city,
            "countryCode": receiver.country,
            "addressLine1": receiver.line1,
            "addressLine2": receiver.line2.clone().unwrap_or_default(),
            "addressLine3": receiver.line3.clone().unwrap_or_default(),
        },
        "contactInformation": {
            "phone": receiver.phone,
            "companyName": receiver.company.clone().unwrap_or_else(|| receiver.name.clone()),
            "fullName": receiver.name,
            "email": receiver.email.clone().unwrap_or_default(),
        },
    })
}

/// One package entry per piece, weight split evenly.
fn packages(weight_kg: f64, pieces: u32) -> Vec<Value> {
    let pieces = pieces.max(1);
    let each = weight_kg / pieces as f64;
    (0..pieces)
        .map(|_| json!({"weight": each, "dimensions": {"length": 1, "width": 1, "height": 1}}))
        .collect()
}

fn accounts(config: &DhlConfig) -> Value {
    json!([{ "typeCode": "shipper", "number": config.account_number }])
}

pub struct ShipmentParts<'a> {
    pub shipper: &'a SenderProfile,
    pub receiver: &'a ContactAddress,
    pub package: &'a PackageDetails,
    pub service: ServiceLevel,
    pub reference: &'a str,
    pub ship_date: NaiveDate,
    pub ship_time: &'a str,
}

pub fn shipment_body(config: &DhlConfig, parts: &ShipmentParts<'_>) -> Value {
    let customs = !parts.receiver.country.eq_ignore_ascii_case(&parts.shipper.country);
    json!({
        "plannedShippingDateAndTime": to_gmt_timestamp(parts.ship_date, parts.ship_time),
        "pickup": { "isRequested": false },
        "productCode": config.product_for(parts.service),
        "accounts": accounts(config),
        "customerDetails": {
            "shipperDetails": shipper_details(parts.shipper),
            "receiverDetails": receiver_details(parts.receiver),
        },
        "content": {
            "packages": packages(parts.package.weight_kg, parts.package.pieces),
            "isCustomsDeclarable": customs,
            "declaredValue": parts.package.declared_value,
            "declaredValueCurrency": config.currency,
            "description": parts.package.description,
            "incoterm": "DAP",
            "unitOfMeasurement": "metric",
        },
        "customerReferences": [{ "value": parts.reference, "typeCode": "CU" }],
    })
}

pub fn pickup_body(config: &DhlConfig, request: &PickupRequest) -> Value {
    json!({
        "plannedPickupDateAndTime": to_gmt_timestamp(request.pickup_date, &request.pickup_time),
        "closeTime": hhmm_to_colon(&request.office_close_time),
        "location": "reception",
        "remark": request.remarks.clone().unwrap_or_else(|| request.reference.clone()),
        "accounts": accounts(config),
        "customerDetails": {
            "shipperDetails": shipper_details(&request.sender),
        },
        "shipmentDetails": [{
            "productCode": config.product_code,
            "isCustomsDeclarable": false,
            "declaredValue": request.declared_value,
            "declaredValueCurrency": config.currency,
            "unitOfMeasurement": "metric",
            "packages": packages(request.weight_kg, request.pieces),
        }],
    })
}

pub fn rate_params(config: &DhlConfig, query: &RateQuery) -> Vec<(&'static str, String)> {
    let customs = !query.origin_country.eq_ignore_ascii_case(&query.destination_country);
    vec![
        ("accountNumber", config.account_number.clone()),
        ("originCountryCode", query.origin_country.clone()),
        ("originPostalCode", query.origin_pincode.clone()),
        ("destinationCountryCode", query.destination_country.clone()),
        ("destinationPostalCode", query.destination_pincode.clone()),
        ("weight", query.weight_kg.to_string()),
        ("length", "1".to_string()),
        ("width", "1".to_string()),
        ("height", "1".to_string()),
        ("plannedShippingDate", query.ship_date.format("%Y-%m-%d").to_string()),
        ("isCustomsDeclarable", customs.to_string()),
        ("unitOfMeasurement", "metric".to_string()),
    ]
}

/// `detail` (falling back to `title`) from the carrier's problem-details body.
pub fn error_message(body: &Value) -> String {
    let detail = body.get("detail").and_then(Value::as_str).filter(|d| !d.is_empty());
    let title = body.get("title").and_then(Value::as_str).filter(|t| !t.is_empty());
    match (title, detail) {
        (Some(t), Some(d)) if t != d => format!("{}: {}", t, d),
        (_, Some(d)) => d.to_string(),
        (Some(t), None) => t.to_string(),
        (None, None) => body
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| "carrier rejected the request".to_string()),
    }
}

pub fn interpret<T>(
    raw: &RawResponse,
    decode: impl FnOnce(&Value) -> Result<T, CarrierError>,
) -> CarrierCall<T> {
    if raw.is_auth_failure() {
        return Err(CarrierError::Authentication(error_message(&raw.details())));
    }
    if raw.is_server_error() {
        return Err(raw.server_error());
    }
    if !raw.is_success() {
        let details = raw.details();
        return Ok(CarrierResult::Rejected(CarrierRejection::new(
            error_message(&details),
            details,
            Some(raw.status),
        )));
    }
    let body = raw.json()?;
    decode(&body).map(CarrierResult::Success)
}

pub fn required_str(body: &Value, pointer: &str) -> Result<String, CarrierError> {
    body.pointer(pointer)
        .and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| CarrierError::Parse(format!("missing {} in response", pointer)))
}

pub fn decode_rates(body: &Value) -> Result<Vec<RateQuote>, CarrierError> {
    let products = body
        .get("products")
        .and_then(Value::as_array)
        .ok_or_else(|| CarrierError::Parse("missing products in rate response".to_string()))?;

    Ok(products
        .iter()
        .filter_map(|product| {
            let prices = product.get("totalPrice").and_then(Value::as_array)?;
            let price = prices
                .iter()
                .find(|p| p.get("currencyType").and_then(Value::as_str) == Some("BILLC"))
                .or_else(|| prices.first())?;
            let capabilities = product.get("deliveryCapabilities");
            Some(RateQuote {
                product_code: product.get("productCode").and_then(Value::as_str).unwrap_or_default().to_string(),
                product_name: product.get("productName").and_then(Value::as_str).unwrap_or_default().to_string(),
                amount: price.get("price").and_then(Value::as_f64)?,
                currency: price.get("priceCurrency").and_then(Value::as_str).unwrap_or_default().to_string(),
                transit_days: capabilities
                    .and_then(|c| c.get("totalTransitDays"))
                    .and_then(|d| d.as_u64().or_else(|| d.as_str().and_then(|s| s.parse().ok())))
                    .map(|d| d as u32),
                estimated_delivery: capabilities
                    .and_then(|c| c.get("estimatedDeliveryDateAndTime"))
                    .and_then(Value::as_str)
                    .and_then(|s| s.get(..10))
                    .and_then(parse_carrier_date),
            })
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct XmlShipmentData {
    #[serde(rename = "Shipment", default)]
    shipments: Vec<XmlShipment>,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlShipment {
    #[serde(rename = "@WaybillNo", default)]
    waybill_no: Option<String>,
    #[serde(rename = "@RefNo", default)]
    ref_no: Option<String>,
    #[serde(rename = "Status", default)]
    status: Option<String>,
    #[serde(rename = "StatusType", default)]
    status_type: Option<String>,
    #[serde(rename = "StatusDate", default)]
    status_date: Option<String>,
    #[serde(rename = "StatusTime", default)]
    status_time: Option<String>,
    #[serde(rename = "ExpectedDeliveryDate", default)]
    expected_delivery_date: Option<String>,
    #[serde(rename = "Scans", default)]
    scans: Option<XmlScans>,
}

#[derive(Debug, Deserialize)]
struct XmlScans {
    #[serde(rename = "ScanDetail", default)]
    details: Vec<XmlScan>,
}

#[derive(Debug, Deserialize)]
struct XmlScan {
    #[serde(rename = "Scan", default)]
    scan: Option<String>,
    #[serde(rename = "ScanCode", default)]
    scan_code: Option<String>,
    #[serde(rename = "ScanType", default)]
    scan_type: Option<String>,
    #[serde(rename = "ScanDate", default)]
    scan_date: Option<String>,
    #[serde(rename = "ScanTime", default)]
    scan_time: Option<String>,
    #[serde(rename = "ScannedLocation", default)]
    scanned_location: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Root element name, skipping an `<?xml ..?>` declaration.
fn root_element(body: &str) -> &str {
    let mut rest = body.trim_start();
    if rest.starts_with("<?") {
        rest = rest.find("?>").map(|i| rest[i + 2..].trim_start()).unwrap_or(rest);
    }
    rest.trim_start_matches('<')
        .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .next()
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct XmlError {
    #[serde(rename = "$text", default)]
    message: String,
}

/// Decode the tracking servlet's XML body into a live snapshot.
pub fn decode_tracking(identifier: &str, body: &str) -> Result<TrackingSnapshot, CarrierError> {
    if root_element(body) == "Error" {
        let error: XmlError = quick_xml::de::from_str(body)
            .map_err(|e| CarrierError::Parse(format!("invalid tracking XML: {}", e)))?;
        return Err(CarrierError::Tracking(error.message.trim().to_string()));
    }

    let data: XmlShipmentData = quick_xml::de::from_str(body)
        .map_err(|e| CarrierError::Parse(format!("invalid tracking XML: {}", e)))?;
    if let Some(error) = non_empty(data.error) {
        return Err(CarrierError::Tracking(error));
    }
    let mut shipments = data.shipments;
    let idx = shipments
        .iter()
        .position(|s| s.waybill_no.as_deref() == Some(identifier) || s.ref_no.as_deref() == Some(identifier))
        .unwrap_or(0);
    if idx >= shipments.len() {
        return Err(CarrierError::Tracking(format!("no shipment found for {}", identifier)));
    }
    let shipment = shipments.swap_remove(idx);
    if shipment.status_type.as_deref() == Some("NF") {
        return Err(CarrierError::Tracking(
            non_empty(shipment.status).unwrap_or_else(|| format!("no shipment found for {}", identifier)),
        ));
    }

    let mut snapshot = TrackingSnapshot::live(
        non_empty(shipment.waybill_no).unwrap_or_else(|| identifier.to_string()),
        CourierCode::Dhl,
        non_empty(shipment.status).unwrap_or_else(|| "UNKNOWN".to_string()),
    );
    snapshot.estimated_delivery = shipment.expected_delivery_date.as_deref().and_then(parse_carrier_date);
    snapshot.events = shipment
        .scans
        .map(|s| s.details)
        .unwrap_or_default()
        .into_iter()
        .map(|scan| TrackingEvent {
            timestamp: scan
                .scan_date
                .as_deref()
                .and_then(|d| parse_carrier_datetime(d, scan.scan_time.as_deref())),
            status_code: non_empty(scan.scan_code)
                .or_else(|| non_empty(scan.scan_type))
                .unwrap_or_default(),
            description: non_empty(scan.scan).unwrap_or_default(),
            location: non_empty(scan.scanned_location),
        })
        .collect();
    if snapshot.events.is_empty() {
        if let Some(date) = shipment.status_date.as_deref() {
            snapshot.events.push(TrackingEvent {
                timestamp: parse_carrier_datetime(date, shipment.status_time.as_deref()),
                status_code: shipment.status_type.clone().unwrap_or_default(),
                description: snapshot.status.clone(),
                location: None,
            });
        }
    }
    snapshot.sort_events();
    snapshot.last_refreshed = Utc::now();
    Ok(snapshot)
}
