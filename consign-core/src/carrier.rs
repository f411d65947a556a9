use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consign_shared::pii::Masked;
use serde::{Deserialize, Serialize, Serializer};

use crate::courier::CourierCode;
use crate::shipment::{
    CancelPickupRequest, PickupCancellation, PickupConfirmation, PickupRequest, RateQuery, RateQuote,
    Serviceability, ShipmentConfirmation, ShipmentRequest, Waybill, WaybillRequest,
};
use crate::tracking::TrackingSnapshot;

/// Failures that escape an adapter. Business-rule rejections from the carrier
/// are not errors, they come back as [`CarrierResult::Rejected`].
#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Carrier call timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unreadable carrier response: {0}")]
    Parse(String),

    #[error("Tracking failed: {0}")]
    Tracking(String),

    #[error("{courier} does not support {operation}")]
    Unsupported {
        courier: CourierCode,
        operation: &'static str,
    },
}

impl CarrierError {
    /// Network-level failure: the carrier could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, CarrierError::Transport(_) | CarrierError::Timeout(_))
    }
}

/// Structured business failure reported by a carrier (invalid pincode, duplicate
/// reference...). Provider details are preserved for manual remediation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierRejection {
    pub message: String,
    pub details: serde_json::Value,
    pub provider_status_code: Option<u16>,
}

impl CarrierRejection {
    pub fn new(message: impl Into<String>, details: serde_json::Value, provider_status_code: Option<u16>) -> Self {
        Self {
            message: message.into(),
            details,
            provider_status_code,
        }
    }
}

/// Outcome of a carrier call that reached the carrier.
#[derive(Debug, Clone, PartialEq)]
pub enum CarrierResult<T> {
    Success(T),
    Rejected(CarrierRejection),
}

impl<T> CarrierResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CarrierResult::Success(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            CarrierResult::Success(value) => Some(value),
            CarrierResult::Rejected(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, CarrierRejection> {
        match self {
            CarrierResult::Success(value) => Ok(value),
            CarrierResult::Rejected(rejection) => Err(rejection),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CarrierResult<U> {
        match self {
            CarrierResult::Success(value) => CarrierResult::Success(f(value)),
            CarrierResult::Rejected(rejection) => CarrierResult::Rejected(rejection),
        }
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T> {
    success: bool,
    data: &'a T,
}

#[derive(Serialize)]
struct FailureEnvelope<'a> {
    success: bool,
    error: &'a str,
    details: &'a serde_json::Value,
    provider_status_code: Option<u16>,
}

/// Serializes as the uniform `{ success, data | error, details, provider_status_code }` envelope.
impl<T: Serialize> Serialize for CarrierResult<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CarrierResult::Success(data) => SuccessEnvelope { success: true, data }.serialize(serializer),
            CarrierResult::Rejected(rejection) => FailureEnvelope {
                success: false,
                error: &rejection.message,
                details: &rejection.details,
                provider_status_code: rejection.provider_status_code,
            }
            .serialize(serializer),
        }
    }
}

pub type CarrierCall<T> = Result<CarrierResult<T>, CarrierError>;

/// Short-lived carrier credential. Obtained per logical operation, never cached.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub value: Masked<String>,
    pub issued_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Masked::new(value.into()),
            issued_at: Utc::now(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.expose()
    }
}

/// Capability set every carrier adapter exposes, whatever its wire protocol.
#[async_trait]
pub trait ShippingProvider: Send + Sync {
    fn code(&self) -> CourierCode;

    /// Obtain a short-lived credential for one logical operation
    async fn authenticate(&self) -> Result<AuthToken, CarrierError>;

    async fn create_shipment(
        &self,
        token: &AuthToken,
        request: &ShipmentRequest,
    ) -> CarrierCall<ShipmentConfirmation>;

    async fn register_pickup(
        &self,
        token: &AuthToken,
        request: &PickupRequest,
    ) -> CarrierCall<PickupConfirmation>;

    async fn cancel_pickup(
        &self,
        token: &AuthToken,
        request: &CancelPickupRequest,
    ) -> CarrierCall<PickupCancellation>;

    async fn generate_waybill(
        &self,
        token: &AuthToken,
        request: &WaybillRequest,
    ) -> CarrierCall<Waybill>;

    /// Bulk variant. Providers without a bulk endpoint issue one call per request.
    async fn generate_waybills(
        &self,
        token: &AuthToken,
        requests: &[WaybillRequest],
    ) -> Result<Vec<CarrierResult<Waybill>>, CarrierError> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.generate_waybill(token, request).await?);
        }
        Ok(results)
    }

    async fn track_shipment(&self, identifier: &str) -> Result<TrackingSnapshot, CarrierError>;

    async fn check_serviceability(
        &self,
        _token: &AuthToken,
        _pincode: &str,
        _country: &str,
    ) -> CarrierCall<Serviceability> {
        Err(CarrierError::Unsupported {
            courier: self.code(),
            operation: "serviceability",
        })
    }

    async fn calculate_rates(
        &self,
        _token: &AuthToken,
        _query: &RateQuery,
    ) -> CarrierCall<Vec<RateQuote>> {
        Err(CarrierError::Unsupported {
            courier: self.code(),
            operation: "rate calculation",
        })
    }

    /// Reachability probe. Only a transport failure counts as unhealthy.
    async fn check_health(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let result: CarrierResult<serde_json::Value> =
            CarrierResult::Success(serde_json::json!({"awb_number": "90012345678"}));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["awb_number"], "90012345678");
    }

    #[test]
    fn test_rejection_envelope_keeps_provider_details() {
        let result: CarrierResult<()> = CarrierResult::Rejected(CarrierRejection::new(
            "Invalid pincode",
            serde_json::json!({"StatusCode": "InvalidPincode"}),
            Some(400),
        ));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Invalid pincode");
        assert_eq!(json["details"]["StatusCode"], "InvalidPincode");
        assert_eq!(json["provider_status_code"], 400);
    }

    #[test]
    fn test_transport_classification() {
        assert!(CarrierError::Timeout("10s".to_string()).is_transport());
        assert!(!CarrierError::Authentication("bad key".to_string()).is_transport());
    }

    #[test]
    fn test_token_is_masked_in_debug() {
        let token = AuthToken::new("eyJhbGciOi");
        assert!(!format!("{:?}", token).contains("eyJhbGciOi"));
        assert_eq!(token.expose(), "eyJhbGciOi");
    }
}
