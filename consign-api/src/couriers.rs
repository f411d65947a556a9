use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use consign_core::{
    CarrierResult, ContactAddress, CourierCode, PackageDetails, RateQuery, RateQuote, ServiceLevel,
    Serviceability, ShipmentConfirmation, ShipmentRequest, TrackingSnapshot,
};
use consign_courier::{
    CourierRecommendation, RankedCourier, Routed, RulesUpdate, SelectionRules, ServicesHealth, ShipmentProfile,
};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    #[serde(default)]
    pub courier: Option<String>,
    /// ISO country of the delivery address, used to pick the courier when none is named
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceabilityQuery {
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RatesRequest {
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(flatten)]
    pub query: RateQuery,
}

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    #[serde(default)]
    pub courier: Option<String>,
    pub receiver: ContactAddress,
    pub package: PackageDetails,
    #[serde(default)]
    pub service: ServiceLevel,
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub rules_version: u64,
    pub recommendations: Vec<RankedCourier>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/couriers/health", get(services_health))
        .route("/v1/couriers/recommendations", post(get_recommendations))
        .route("/v1/couriers/select", post(select_courier))
        .route("/v1/couriers/track/{number}", get(track_shipment))
        .route("/v1/couriers/rates", post(calculate_rates))
        .route("/v1/couriers/shipments", post(create_shipment))
        .route("/v1/couriers/serviceability/{pincode}", get(check_serviceability))
        .route("/v1/couriers/rules", get(get_rules).put(update_rules))
}

fn parse_courier(raw: Option<&str>) -> Result<Option<CourierCode>, AppError> {
    raw.filter(|c| !c.trim().is_empty())
        .map(str::parse::<CourierCode>)
        .transpose()
        .map_err(|e| AppError::ValidationError(e.to_string()))
}

/// GET /v1/couriers/health
/// 503 only when no courier at all is reachable.
pub async fn services_health(State(state): State<AppState>) -> (StatusCode, Json<ServicesHealth>) {
    let health = state.couriers.check_services_health().await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

/// POST /v1/couriers/recommendations
pub async fn get_recommendations(
    State(state): State<AppState>,
    Json(profile): Json<ShipmentProfile>,
) -> Json<RecommendationsResponse> {
    let rules_version = state.couriers.rules().version;
    Json(RecommendationsResponse {
        rules_version,
        recommendations: state.couriers.get_recommendations(&profile),
    })
}

/// POST /v1/couriers/select
pub async fn select_courier(
    State(state): State<AppState>,
    Json(profile): Json<ShipmentProfile>,
) -> Result<Json<CourierRecommendation>, AppError> {
    if !profile.weight_kg.is_finite() || profile.weight_kg < 0.0 {
        return Err(AppError::ValidationError("weight_kg must be a non-negative number".to_string()));
    }
    let recommendation = state.couriers.select_courier(&profile).map_err(AppError::courier)?;
    Ok(Json(recommendation))
}

/// GET /v1/couriers/track/{number}
pub async fn track_shipment(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<Routed<TrackingSnapshot>>, AppError> {
    let courier = parse_courier(query.courier.as_deref())?;
    let destination = query
        .destination
        .unwrap_or_else(|| state.couriers.home_country().to_string());
    let routed = state
        .couriers
        .track_shipment(&number, courier, &destination)
        .await
        .map_err(AppError::courier)?;
    Ok(Json(routed))
}

/// POST /v1/couriers/rates
pub async fn calculate_rates(
    State(state): State<AppState>,
    Json(req): Json<RatesRequest>,
) -> Result<Json<Routed<CarrierResult<Vec<RateQuote>>>>, AppError> {
    let courier = parse_courier(req.courier.as_deref())?;
    let routed = state
        .couriers
        .calculate_rates(&req.query, courier)
        .await
        .map_err(AppError::courier)?;
    Ok(Json(routed))
}

/// POST /v1/couriers/shipments
/// Books an ad-hoc shipment from the configured warehouse.
pub async fn create_shipment(
    State(state): State<AppState>,
    Json(req): Json<CreateShipmentRequest>,
) -> Result<Json<Routed<CarrierResult<ShipmentConfirmation>>>, AppError> {
    let courier = parse_courier(req.courier.as_deref())?;
    let request = ShipmentRequest {
        sender: state.sender.as_ref().clone(),
        receiver: req.receiver,
        package: req.package,
        service: req.service,
        reference: req.reference,
    };
    request
        .validate()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let routed = state
        .couriers
        .create_shipment(&request, courier)
        .await
        .map_err(AppError::courier)?;
    Ok(Json(routed))
}

/// GET /v1/couriers/serviceability/{pincode}
pub async fn check_serviceability(
    State(state): State<AppState>,
    Path(pincode): Path<String>,
    Query(query): Query<ServiceabilityQuery>,
) -> Result<Json<Routed<CarrierResult<Serviceability>>>, AppError> {
    let courier = parse_courier(query.courier.as_deref())?;
    let country = query
        .country
        .unwrap_or_else(|| state.couriers.home_country().to_string());
    let routed = state
        .couriers
        .check_serviceability(&pincode, &country, courier)
        .await
        .map_err(AppError::courier)?;
    Ok(Json(routed))
}

/// GET /v1/couriers/rules
pub async fn get_rules(State(state): State<AppState>) -> Json<SelectionRules> {
    Json(state.couriers.rules().as_ref().clone())
}

/// PUT /v1/couriers/rules
pub async fn update_rules(
    State(state): State<AppState>,
    Json(update): Json<RulesUpdate>,
) -> Result<Json<SelectionRules>, AppError> {
    if update.is_empty() {
        return Err(AppError::ValidationError("rules update is empty".to_string()));
    }
    let rules = state.couriers.update_rules(update).map_err(AppError::courier)?;
    Ok(Json(rules.as_ref().clone()))
}
