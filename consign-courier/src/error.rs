use consign_core::courier::UnknownCourier;
use consign_core::{CarrierError, CourierCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Courier {0} is not configured")]
    NotConfigured(CourierCode),

    #[error(transparent)]
    UnknownCourier(#[from] UnknownCourier),

    #[error("No courier serves destination {0}")]
    NoCourierAvailable(String),

    #[error("Invalid selection rules: {0}")]
    InvalidRules(String),

    #[error(transparent)]
    Carrier(#[from] CarrierError),
}
