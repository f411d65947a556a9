use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use consign_core::{ContactAddress, ServiceLevel, TrackingSnapshot};
use consign_order::{Customer, ErrorLogEntry, Order, OrderItem, OrderStatus};

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Order handed over by order intake.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub order_number: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub shipping_address: ContactAddress,
    #[serde(default)]
    pub billing_address: Option<ContactAddress>,
    #[serde(default)]
    pub cash_on_delivery: bool,
    #[serde(default)]
    pub service: ServiceLevel,
    #[serde(default)]
    pub preferred_courier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub order_id: Uuid,
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub order: Order,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelPickupBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// `{ success, message, result }` wrapper around a fulfillment outcome.
#[derive(Debug, Serialize)]
pub struct OutcomeResponse<T> {
    pub success: bool,
    pub message: String,
    pub result: T,
}

#[derive(Debug, Serialize)]
pub struct FulfillmentErrorsResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub errors: Vec<ErrorLogEntry>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", put(update_status))
        .route("/v1/orders/{id}/pickup", post(register_pickup))
        .route("/v1/orders/{id}/pickup/cancel", post(cancel_pickup))
        .route("/v1/orders/{id}/waybill", post(generate_waybill))
        .route("/v1/orders/{id}/tracking", get(get_tracking))
        .route("/v1/orders/{id}/fulfillment-errors", get(get_fulfillment_errors))
}

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    if req.order_number.trim().is_empty() {
        return Err(AppError::ValidationError("order_number is required".to_string()));
    }
    if req.items.is_empty() {
        return Err(AppError::ValidationError("an order needs at least one item".to_string()));
    }

    let mut order = Order::new(req.order_number, req.customer, req.items, req.shipping_address);
    order.billing_address = req.billing_address;
    order.cash_on_delivery = req.cash_on_delivery;
    order.service = req.service;
    order.preferred_courier = req.preferred_courier;

    let saved = state
        .orchestrator
        .create_order(order)
        .await
        .map_err(AppError::fulfillment)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /v1/orders/{id}
pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> Result<Json<Order>, AppError> {
    let order = state
        .orchestrator
        .find_order(order_id)
        .await
        .map_err(AppError::fulfillment)?;
    Ok(Json(order))
}

/// PUT /v1/orders/{id}/status
/// Carrier side-effects run after the status is stored and never fail this call.
pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: consign_order::OrderError| AppError::ValidationError(e.to_string()))?;

    let update = state
        .orchestrator
        .update_status(order_id, status)
        .await
        .map_err(AppError::fulfillment)?;

    Ok(Json(StatusUpdateResponse {
        order_id,
        previous_status: update.previous_status,
        status: update.order.status,
        order: update.order,
    }))
}

/// POST /v1/orders/{id}/pickup
pub async fn register_pickup(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OutcomeResponse<Value>>, AppError> {
    let outcome = state
        .orchestrator
        .register_pickup(order_id)
        .await
        .map_err(AppError::fulfillment)?;
    Ok(Json(OutcomeResponse {
        success: outcome.is_success(),
        message: outcome.message(),
        result: serde_json::to_value(&outcome)?,
    }))
}

/// POST /v1/orders/{id}/pickup/cancel
pub async fn cancel_pickup(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(body): Json<CancelPickupBody>,
) -> Result<Json<OutcomeResponse<Value>>, AppError> {
    let outcome = state
        .orchestrator
        .cancel_pickup(order_id, body.reason)
        .await
        .map_err(AppError::fulfillment)?;
    Ok(Json(OutcomeResponse {
        success: outcome.is_success(),
        message: outcome.message(),
        result: serde_json::to_value(&outcome)?,
    }))
}

/// POST /v1/orders/{id}/waybill
pub async fn generate_waybill(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OutcomeResponse<Value>>, AppError> {
    let outcome = state
        .orchestrator
        .generate_waybill(order_id)
        .await
        .map_err(AppError::fulfillment)?;
    Ok(Json(OutcomeResponse {
        success: outcome.is_success(),
        message: outcome.message(),
        result: serde_json::to_value(&outcome)?,
    }))
}

/// GET /v1/orders/{id}/tracking
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<TrackingSnapshot>, AppError> {
    let snapshot = state
        .orchestrator
        .refresh_tracking(order_id)
        .await
        .map_err(AppError::fulfillment)?;
    Ok(Json(snapshot))
}

/// GET /v1/orders/{id}/fulfillment-errors
pub async fn get_fulfillment_errors(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<FulfillmentErrorsResponse>, AppError> {
    let order = state
        .orchestrator
        .find_order(order_id)
        .await
        .map_err(AppError::fulfillment)?;
    Ok(Json(FulfillmentErrorsResponse {
        order_id,
        order_number: order.order_number,
        errors: order.fulfillment_errors,
    }))
}
