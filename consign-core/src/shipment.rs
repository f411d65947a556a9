use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::address::{ContactAddress, SenderProfile};
use crate::carrier::CarrierError;

/// Service selection for a shipment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceLevel {
    #[default]
    Standard,
    Express,
    Overnight,
}

impl ServiceLevel {
    pub fn is_expedited(&self) -> bool {
        matches!(self, ServiceLevel::Express | ServiceLevel::Overnight)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceLevel::Standard => "standard",
            ServiceLevel::Express => "express",
            ServiceLevel::Overnight => "overnight",
        }
    }
}

impl FromStr for ServiceLevel {
    type Err = CarrierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standard" => Ok(ServiceLevel::Standard),
            "express" => Ok(ServiceLevel::Express),
            "overnight" => Ok(ServiceLevel::Overnight),
            other => Err(CarrierError::Validation(format!("unknown service level '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDetails {
    pub weight_kg: f64,
    pub pieces: u32,
    pub declared_value: f64,
    pub description: String,
}

impl PackageDetails {
    fn validate(&self) -> Result<(), CarrierError> {
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(CarrierError::Validation("package weight must be greater than zero".to_string()));
        }
        if self.pieces == 0 {
            return Err(CarrierError::Validation("package must have at least one piece".to_string()));
        }
        if self.declared_value < 0.0 {
            return Err(CarrierError::Validation("declared value cannot be negative".to_string()));
        }
        Ok(())
    }
}

/// Per-call shipment request. Built fresh for every carrier call.
#[derive(Debug, Clone)]
pub struct ShipmentRequest {
    pub sender: SenderProfile,
    pub receiver: ContactAddress,
    pub package: PackageDetails,
    pub service: ServiceLevel,
    /// Caller reference, normally the order number
    pub reference: String,
}

impl ShipmentRequest {
    /// Checked before any adapter touches the network.
    pub fn validate(&self) -> Result<(), CarrierError> {
        require_pincode(&self.receiver.pincode, "receiver")?;
        self.package.validate()?;
        if self.reference.trim().is_empty() {
            return Err(CarrierError::Validation("shipment reference is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentConfirmation {
    pub tracking_number: String,
    pub status: String,
    pub label_url: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct PickupRequest {
    pub reference: String,
    pub sender: SenderProfile,
    pub pieces: u32,
    pub weight_kg: f64,
    pub declared_value: f64,
    pub pickup_date: NaiveDate,
    /// HHMM, carrier local time
    pub pickup_time: String,
    /// HHMM
    pub office_close_time: String,
    pub remarks: Option<String>,
}

impl PickupRequest {
    pub fn validate(&self) -> Result<(), CarrierError> {
        require_pincode(&self.sender.pincode, "sender")?;
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(CarrierError::Validation("pickup weight must be greater than zero".to_string()));
        }
        if self.pieces == 0 {
            return Err(CarrierError::Validation("pickup must have at least one piece".to_string()));
        }
        require_hhmm(&self.pickup_time, "pickup_time")?;
        require_hhmm(&self.office_close_time, "office_close_time")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupConfirmation {
    pub token_number: String,
    pub status: String,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPickupRequest {
    pub pickup_token: String,
    pub registration_date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupCancellation {
    pub status: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct WaybillRequest {
    pub shipper: SenderProfile,
    pub consignee: ContactAddress,
    pub package: PackageDetails,
    pub service: ServiceLevel,
    pub reference: String,
    pub pickup_date: NaiveDate,
    pub pickup_time: String,
    /// Cash-on-delivery amount, zero for prepaid
    pub collectable_amount: f64,
}

impl WaybillRequest {
    pub fn validate(&self) -> Result<(), CarrierError> {
        require_pincode(&self.consignee.pincode, "consignee")?;
        require_pincode(&self.shipper.pincode, "shipper")?;
        self.package.validate()?;
        if self.reference.trim().is_empty() {
            return Err(CarrierError::Validation("waybill reference is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waybill {
    pub awb_number: String,
    pub status: String,
    pub destination_area: Option<String>,
    pub destination_location: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuery {
    pub origin_pincode: String,
    pub origin_country: String,
    pub destination_pincode: String,
    pub destination_country: String,
    pub weight_kg: f64,
    #[serde(default)]
    pub declared_value: f64,
    pub ship_date: NaiveDate,
}

impl RateQuery {
    pub fn validate(&self) -> Result<(), CarrierError> {
        require_pincode(&self.destination_pincode, "destination")?;
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(CarrierError::Validation("weight must be greater than zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateQuote {
    pub product_code: String,
    pub product_name: String,
    pub amount: f64,
    pub currency: String,
    pub transit_days: Option<u32>,
    pub estimated_delivery: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Serviceability {
    pub pincode: String,
    pub serviceable: bool,
    pub area_code: Option<String>,
    pub description: Option<String>,
    pub services: Vec<String>,
}

fn require_pincode(pincode: &str, block: &str) -> Result<(), CarrierError> {
    let trimmed = pincode.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '0') {
        return Err(CarrierError::Validation(format!("{} pincode is required", block)));
    }
    Ok(())
}

fn require_hhmm(value: &str, field: &str) -> Result<(), CarrierError> {
    let valid = value.len() == 4
        && value.chars().all(|c| c.is_ascii_digit())
        && value[..2].parse::<u32>().map(|h| h < 24).unwrap_or(false)
        && value[2..].parse::<u32>().map(|m| m < 60).unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(CarrierError::Validation(format!("{} must be HHMM, got '{}'", field, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receiver(pincode: &str) -> ContactAddress {
        ContactAddress {
            name: "Asha Rao".to_string(),
            line1: "4 Residency Road".to_string(),
            city: "Bengaluru".to_string(),
            pincode: pincode.to_string(),
            country: "IN".to_string(),
            phone: "9800000000".to_string(),
            ..Default::default()
        }
    }

    fn shipment(pincode: &str, weight_kg: f64) -> ShipmentRequest {
        ShipmentRequest {
            sender: SenderProfile { pincode: "400001".to_string(), ..Default::default() },
            receiver: receiver(pincode),
            package: PackageDetails {
                weight_kg,
                pieces: 1,
                declared_value: 1200.0,
                description: "Books".to_string(),
            },
            service: ServiceLevel::Standard,
            reference: "ORD-1001".to_string(),
        }
    }

    #[test]
    fn test_shipment_requires_pincode_and_weight() {
        assert!(shipment("560025", 1.0).validate().is_ok());

        let missing_pin = shipment("", 1.0).validate();
        assert!(matches!(missing_pin, Err(CarrierError::Validation(_))));

        let zero_pin = shipment("000000", 1.0).validate();
        assert!(matches!(zero_pin, Err(CarrierError::Validation(_))));

        let zero_weight = shipment("560025", 0.0).validate();
        assert!(matches!(zero_weight, Err(CarrierError::Validation(_))));
    }

    #[test]
    fn test_pickup_time_format() {
        let mut request = PickupRequest {
            reference: "ORD-1".to_string(),
            sender: SenderProfile { pincode: "400001".to_string(), ..Default::default() },
            pieces: 2,
            weight_kg: 1.0,
            declared_value: 0.0,
            pickup_date: NaiveDate::from_ymd_opt(2024, 10, 12).unwrap(),
            pickup_time: "1400".to_string(),
            office_close_time: "1800".to_string(),
            remarks: None,
        };
        assert!(request.validate().is_ok());

        request.pickup_time = "25:00".to_string();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_service_level_parse() {
        assert_eq!("EXPRESS".parse::<ServiceLevel>().unwrap(), ServiceLevel::Express);
        assert_eq!("".parse::<ServiceLevel>().unwrap(), ServiceLevel::Standard);
        assert!(ServiceLevel::Overnight.is_expedited());
        assert!("teleport".parse::<ServiceLevel>().is_err());
    }
}
