use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use consign_core::CarrierError;
use consign_courier::CourierError;
use consign_order::{FulfillmentError, OrderError, StoreError};

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    /// A carrier could not be reached or answered garbage
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn fulfillment(err: FulfillmentError) -> Self {
        match err {
            FulfillmentError::Order(OrderError::NotFound(id)) | FulfillmentError::Store(StoreError::NotFound(id)) => {
                AppError::NotFoundError(format!("Order not found: {}", id))
            }
            FulfillmentError::Order(e @ OrderError::InvalidTransition { .. }) => AppError::ConflictError(e.to_string()),
            FulfillmentError::Order(e @ OrderError::UnknownStatus(_)) => AppError::ValidationError(e.to_string()),
            FulfillmentError::Store(e @ StoreError::VersionConflict { .. }) => AppError::ConflictError(e.to_string()),
            FulfillmentError::Store(e @ StoreError::Duplicate(_)) => AppError::ConflictError(e.to_string()),
            other => AppError::Anyhow(other.into()),
        }
    }

    pub fn courier(err: CourierError) -> Self {
        match err {
            CourierError::Carrier(CarrierError::Validation(msg)) => AppError::ValidationError(msg),
            CourierError::Carrier(e @ CarrierError::Unsupported { .. }) => AppError::ValidationError(e.to_string()),
            CourierError::Carrier(e) => AppError::UpstreamError(e.to_string()),
            e @ CourierError::NotConfigured(_) => AppError::ValidationError(e.to_string()),
            e @ CourierError::UnknownCourier(_) => AppError::ValidationError(e.to_string()),
            e @ CourierError::NoCourierAvailable(_) => AppError::ValidationError(e.to_string()),
            e @ CourierError::InvalidRules(_) => AppError::ValidationError(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::warn!("Carrier failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
