use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shipping providers the platform can route to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CourierCode {
    /// Domestic pickup/waybill/tracking carrier (JSON API).
    BlueDart,
    /// International carrier (JSON shipment API, XML tracking).
    Dhl,
}

impl CourierCode {
    pub const ALL: [CourierCode; 2] = [CourierCode::BlueDart, CourierCode::Dhl];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourierCode::BlueDart => "bluedart",
            CourierCode::Dhl => "dhl",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CourierCode::BlueDart => "Blue Dart",
            CourierCode::Dhl => "DHL Express",
        }
    }
}

impl fmt::Display for CourierCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown courier: {0}")]
pub struct UnknownCourier(pub String);

impl FromStr for CourierCode {
    type Err = UnknownCourier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bluedart" | "blue_dart" | "blue dart" => Ok(CourierCode::BlueDart),
            "dhl" => Ok(CourierCode::Dhl),
            other => Err(UnknownCourier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_courier_code() {
        assert_eq!("BlueDart".parse::<CourierCode>().unwrap(), CourierCode::BlueDart);
        assert_eq!(" DHL ".parse::<CourierCode>().unwrap(), CourierCode::Dhl);
        assert!("fedex".parse::<CourierCode>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_code() {
        assert_eq!(serde_json::to_string(&CourierCode::BlueDart).unwrap(), "\"bluedart\"");
        let code: CourierCode = serde_json::from_str("\"dhl\"").unwrap();
        assert_eq!(code, CourierCode::Dhl);
    }
}
