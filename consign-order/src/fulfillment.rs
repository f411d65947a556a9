use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use consign_core::{
    CancelPickupRequest, CarrierRejection, CarrierResult, CourierCode, NotificationSink,
    PackageDetails, PickupRequest, SenderProfile, TrackingSnapshot, WaybillRequest,
};
use consign_courier::{CourierError, CourierManager, ShipmentProfile};
use consign_shared::models::events::{FulfillmentEvent, FulfillmentEventKind};

use crate::lifecycle::{effects_for, superseded_effects, validate_transition, OrderError};
use crate::lock::OrderLock;
use crate::models::{
    ErrorLogEntry, FulfillmentOperation, Order, OrderStatus, PickupCancellationRecord, PickupRecord,
    WaybillRecord,
};
use crate::outbox::{PendingEffect, SideEffect};
use crate::repository::{OrderPatch, OrderStore, StoreError};
use crate::tracking::degraded_snapshot;

/// Writes re-read the order and retry this many times on a version conflict.
const WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FulfillmentSettings {
    pub default_item_weight_kg: f64,
    pub min_pickup_weight_kg: f64,
    pub max_pickup_weight_kg: f64,
    /// HHMM
    pub pickup_time: String,
    /// HHMM
    pub office_close_time: String,
    pub outbox_max_attempts: u32,
    pub lock_ttl_secs: u64,
    pub worker_interval_secs: u64,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            default_item_weight_kg: 0.5,
            min_pickup_weight_kg: 0.5,
            max_pickup_weight_kg: 50.0,
            pickup_time: "1400".to_string(),
            office_close_time: "1800".to_string(),
            outbox_max_attempts: 1,
            lock_ttl_secs: 30,
            worker_interval_secs: 15,
        }
    }
}

/// Failures of the primary operation. Carrier failures are never reported here,
/// they land in the order's error log and in the returned outcome.
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub previous_status: OrderStatus,
    pub order: Order,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PickupOutcome {
    Registered { pickup: PickupRecord },
    AlreadyRegistered { pickup: PickupRecord },
    /// Another worker holds the order lock
    InProgress,
    /// The order is delivered or cancelled, so no carrier was called
    Skipped { message: String },
    Rejected { rejection: CarrierRejection },
    Failed { message: String },
}

impl PickupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PickupOutcome::Registered { .. } | PickupOutcome::AlreadyRegistered { .. })
    }

    pub fn message(&self) -> String {
        match self {
            PickupOutcome::Registered { pickup } => format!("Pickup registered with token {}", pickup.token_number),
            PickupOutcome::AlreadyRegistered { pickup } => {
                format!("Pickup already registered with token {}", pickup.token_number)
            }
            PickupOutcome::InProgress => "Pickup registration already in progress".to_string(),
            PickupOutcome::Skipped { message } => message.clone(),
            PickupOutcome::Rejected { rejection } => rejection.message.clone(),
            PickupOutcome::Failed { message } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    NoPickup,
    AlreadyCancelled { pickup: PickupRecord },
    Cancelled { pickup: PickupRecord },
    InProgress,
    Rejected { rejection: CarrierRejection },
    Failed { message: String },
}

impl CancelOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CancelOutcome::Cancelled { .. } | CancelOutcome::AlreadyCancelled { .. })
    }

    pub fn message(&self) -> String {
        match self {
            CancelOutcome::NoPickup => "No pickup found to cancel".to_string(),
            CancelOutcome::AlreadyCancelled { .. } => "Pickup already cancelled".to_string(),
            CancelOutcome::Cancelled { pickup } => format!("Pickup {} cancelled", pickup.token_number),
            CancelOutcome::InProgress => "Another pickup operation is in progress".to_string(),
            CancelOutcome::Rejected { rejection } => rejection.message.clone(),
            CancelOutcome::Failed { message } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaybillOutcome {
    Generated { waybill: WaybillRecord },
    AlreadyGenerated { waybill: WaybillRecord },
    InProgress,
    Rejected { rejection: CarrierRejection },
    Failed { message: String },
}

impl WaybillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WaybillOutcome::Generated { .. } | WaybillOutcome::AlreadyGenerated { .. })
    }

    pub fn message(&self) -> String {
        match self {
            WaybillOutcome::Generated { waybill } => format!("Waybill {} generated", waybill.awb_number),
            WaybillOutcome::AlreadyGenerated { waybill } => {
                format!("Waybill {} already generated", waybill.awb_number)
            }
            WaybillOutcome::InProgress => "Waybill generation already in progress".to_string(),
            WaybillOutcome::Rejected { rejection } => rejection.message.clone(),
            WaybillOutcome::Failed { message } => message.clone(),
        }
    }
}

/// Drives carrier side-effects off order status changes.
///
/// The status write and the side-effects it owes are persisted together; the
/// effects then run best-effort. A carrier failure is logged on the order and
/// never undoes the status change.
pub struct FulfillmentOrchestrator {
    couriers: Arc<CourierManager>,
    store: Arc<dyn OrderStore>,
    lock: Arc<dyn OrderLock>,
    notifier: Arc<dyn NotificationSink>,
    sender: SenderProfile,
    settings: FulfillmentSettings,
}

impl FulfillmentOrchestrator {
    pub fn new(
        couriers: Arc<CourierManager>,
        store: Arc<dyn OrderStore>,
        lock: Arc<dyn OrderLock>,
        notifier: Arc<dyn NotificationSink>,
        sender: SenderProfile,
        settings: FulfillmentSettings,
    ) -> Self {
        Self {
            couriers,
            store,
            lock,
            notifier,
            sender,
            settings,
        }
    }

    pub fn couriers(&self) -> &Arc<CourierManager> {
        &self.couriers
    }

    pub fn settings(&self) -> &FulfillmentSettings {
        &self.settings
    }

    pub async fn find_order(&self, order_id: Uuid) -> Result<Order, FulfillmentError> {
        self.store
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id).into())
    }

    /// Take over an order from order intake. It starts with no courier artifacts.
    pub async fn create_order(&self, order: Order) -> Result<Order, FulfillmentError> {
        let saved = self.store.save(&order).await?;
        info!("Order {} accepted for fulfillment", saved.order_number);
        Ok(saved)
    }

    /// Move the order to `new_status`, queueing and then running the side-effects the move owes.
    pub async fn update_status(&self, order_id: Uuid, new_status: OrderStatus) -> Result<StatusUpdate, FulfillmentError> {
        let mut attempt = 1;
        let (previous_status, order) = loop {
            let order = self.find_order(order_id).await?;
            let previous = order.status;
            validate_transition(previous, new_status)?;
            if previous == new_status {
                return Ok(StatusUpdate {
                    previous_status: previous,
                    order,
                });
            }

            let patch = OrderPatch {
                status: Some(new_status),
                upsert_effects: effects_for(previous, new_status, &order)
                    .into_iter()
                    .map(PendingEffect::new)
                    .collect(),
                remove_effects: superseded_effects(new_status, &order),
                ..Default::default()
            };
            match self.store.update(order_id, order.version, patch).await {
                Ok(updated) => break (previous, updated),
                Err(StoreError::VersionConflict { .. }) if attempt < WRITE_ATTEMPTS => {
                    debug!("Order {} changed underneath status update, retrying", order_id);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        info!("Order {} moved from {} to {}", order.order_number, previous_status, new_status);
        let order = self.run_effects(order).await;
        Ok(StatusUpdate { previous_status, order })
    }

    pub async fn register_pickup(&self, order_id: Uuid) -> Result<PickupOutcome, FulfillmentError> {
        self.register_pickup_with(order_id, None).await
    }

    pub async fn cancel_pickup(&self, order_id: Uuid, reason: Option<String>) -> Result<CancelOutcome, FulfillmentError> {
        self.cancel_pickup_with(order_id, reason, None).await
    }

    pub async fn generate_waybill(&self, order_id: Uuid) -> Result<WaybillOutcome, FulfillmentError> {
        self.with_lock(order_id, WaybillOutcome::InProgress, || self.generate_waybill_locked(order_id))
            .await
    }

    /// Latest tracking for the order. Falls back to a timeline inferred from the
    /// order status when there is no waybill yet or the courier cannot be reached.
    pub async fn refresh_tracking(&self, order_id: Uuid) -> Result<TrackingSnapshot, FulfillmentError> {
        let order = self.find_order(order_id).await?;
        let Some(waybill) = order.waybill.as_ref() else {
            debug!("Order {} has no waybill yet, serving inferred tracking", order.order_number);
            return Ok(degraded_snapshot(&order));
        };

        let routed = match self
            .couriers
            .track_shipment(&waybill.awb_number, Some(waybill.courier), &order.shipping_address.country)
            .await
        {
            Ok(routed) => routed,
            Err(err) => {
                warn!("Live tracking failed for order {}: {}", order.order_number, err);
                return Ok(degraded_snapshot(&order));
            }
        };

        let snapshot = routed.result;
        let changed = order
            .tracking
            .as_ref()
            .map(|previous| previous.status != snapshot.status)
            .unwrap_or(true);

        let patch = OrderPatch {
            tracking: Some(snapshot.clone()),
            ..Default::default()
        };
        if let Err(err) = self.write(order_id, patch).await {
            warn!("Could not store tracking snapshot for order {}: {}", order.order_number, err);
        }
        if changed {
            self.notify(
                FulfillmentEventKind::TrackingUpdated,
                order_id,
                json!({
                    "courier": routed.courier,
                    "awb_number": snapshot.tracking_number,
                    "status": snapshot.status,
                }),
            )
            .await;
        }
        Ok(snapshot)
    }

    /// Drain side-effects left queued by crashes, lock contention or retry budgets.
    /// Returns the number of effects attempted.
    pub async fn process_pending(&self, limit: usize) -> Result<usize, FulfillmentError> {
        let orders = self.store.find_with_pending_effects(limit).await?;
        let mut attempted = 0;
        for order in orders {
            for effect in order.pending_effects {
                let name = effect.effect.name();
                attempted += 1;
                if let Err(err) = self.run_effect(order.id, effect).await {
                    error!("Queued {} for order {} failed: {}", name, order.order_number, err);
                }
            }
        }
        Ok(attempted)
    }

    async fn run_effects(&self, order: Order) -> Order {
        if order.pending_effects.is_empty() {
            return order;
        }
        for effect in order.pending_effects.clone() {
            let name = effect.effect.name();
            if let Err(err) = self.run_effect(order.id, effect).await {
                error!("Side-effect {} for order {} failed: {}", name, order.order_number, err);
            }
        }
        match self.store.find_by_id(order.id).await {
            Ok(Some(latest)) => latest,
            _ => order,
        }
    }

    async fn run_effect(&self, order_id: Uuid, effect: PendingEffect) -> Result<(), FulfillmentError> {
        match effect.effect.clone() {
            SideEffect::RegisterPickup => {
                let outcome = self.register_pickup_with(order_id, Some(effect)).await?;
                debug!("register_pickup for {}: {}", order_id, outcome.message());
            }
            SideEffect::CancelPickup { reason } => {
                let outcome = self.cancel_pickup_with(order_id, Some(reason), Some(effect)).await?;
                debug!("cancel_pickup for {}: {}", order_id, outcome.message());
            }
        }
        Ok(())
    }

    async fn register_pickup_with(
        &self,
        order_id: Uuid,
        effect: Option<PendingEffect>,
    ) -> Result<PickupOutcome, FulfillmentError> {
        self.with_lock(order_id, PickupOutcome::InProgress, || {
            self.register_pickup_locked(order_id, effect)
        })
        .await
    }

    async fn register_pickup_locked(
        &self,
        order_id: Uuid,
        effect: Option<PendingEffect>,
    ) -> Result<PickupOutcome, FulfillmentError> {
        let order = self.find_order(order_id).await?;
        let effect = effect.or_else(|| queued(&order, |e| matches!(e, SideEffect::RegisterPickup)));

        if let Some(pickup) = order.pickup.clone().filter(|p| !p.token_number.is_empty()) {
            info!(
                "Pickup already registered for order {} (token {})",
                order.order_number, pickup.token_number
            );
            let mut patch = OrderPatch::default();
            self.settle(effect, None, &mut patch);
            self.write(order_id, patch).await?;
            return Ok(PickupOutcome::AlreadyRegistered { pickup });
        }
        if order.status.is_terminal() {
            info!(
                "Not registering a pickup for order {} in status {}",
                order.order_number, order.status
            );
            let mut patch = OrderPatch::default();
            self.settle(effect, None, &mut patch);
            self.write(order_id, patch).await?;
            return Ok(PickupOutcome::Skipped {
                message: format!("Order {} is {}", order.order_number, order.status.as_str().to_lowercase()),
            });
        }

        let courier = match self.courier_for(&order) {
            Ok(courier) => courier,
            Err(err) => {
                let message = err.to_string();
                let entry = ErrorLogEntry::new(FulfillmentOperation::PickupRegistration, &message);
                self.record_failure(order_id, effect, entry).await?;
                return Ok(PickupOutcome::Failed { message });
            }
        };

        let request = self.pickup_request(&order);
        match self.couriers.register_pickup(courier, &request).await {
            Ok(CarrierResult::Success(confirmation)) => {
                let pickup = PickupRecord {
                    courier,
                    token_number: confirmation.token_number,
                    status: confirmation.status,
                    pickup_date: confirmation.pickup_date,
                    pickup_time: confirmation.pickup_time,
                    pieces: request.pieces,
                    weight_kg: request.weight_kg,
                    area_code: self.sender.area_code.clone(),
                    remarks: request.remarks.clone(),
                    registered_at: Utc::now(),
                    cancellation: None,
                };
                let mut patch = OrderPatch {
                    courier: Some(courier),
                    pickup: Some(pickup.clone()),
                    ..Default::default()
                };
                self.settle(effect, None, &mut patch);
                self.write(order_id, patch).await?;

                info!(
                    "Pickup {} registered with {} for order {}",
                    pickup.token_number, courier, order.order_number
                );
                self.notify(
                    FulfillmentEventKind::PickupRegistered,
                    order_id,
                    json!({
                        "courier": courier,
                        "token_number": pickup.token_number,
                        "pickup_date": pickup.pickup_date,
                        "pickup_time": pickup.pickup_time,
                    }),
                )
                .await;
                Ok(PickupOutcome::Registered { pickup })
            }
            Ok(CarrierResult::Rejected(rejection)) => {
                let entry = ErrorLogEntry::new(FulfillmentOperation::PickupRegistration, &rejection.message)
                    .with_provider(rejection.details.clone(), rejection.provider_status_code);
                self.record_failure(order_id, effect, entry).await?;
                Ok(PickupOutcome::Rejected { rejection })
            }
            Err(err) => {
                let message = err.to_string();
                let entry = ErrorLogEntry::new(FulfillmentOperation::PickupRegistration, &message);
                self.record_failure(order_id, effect, entry).await?;
                Ok(PickupOutcome::Failed { message })
            }
        }
    }

    async fn cancel_pickup_with(
        &self,
        order_id: Uuid,
        reason: Option<String>,
        effect: Option<PendingEffect>,
    ) -> Result<CancelOutcome, FulfillmentError> {
        self.with_lock(order_id, CancelOutcome::InProgress, || {
            self.cancel_pickup_locked(order_id, reason, effect)
        })
        .await
    }

    async fn cancel_pickup_locked(
        &self,
        order_id: Uuid,
        reason: Option<String>,
        effect: Option<PendingEffect>,
    ) -> Result<CancelOutcome, FulfillmentError> {
        let order = self.find_order(order_id).await?;
        let effect = effect.or_else(|| queued(&order, |e| matches!(e, SideEffect::CancelPickup { .. })));

        let Some(mut pickup) = order.pickup.clone().filter(|p| !p.token_number.is_empty()) else {
            let mut patch = OrderPatch::default();
            self.settle(effect, None, &mut patch);
            self.write(order_id, patch).await?;
            return Ok(CancelOutcome::NoPickup);
        };
        if pickup.is_cancelled() {
            let mut patch = OrderPatch::default();
            self.settle(effect, None, &mut patch);
            self.write(order_id, patch).await?;
            return Ok(CancelOutcome::AlreadyCancelled { pickup });
        }

        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| format!("Order {} cancelled", order.order_number));
        let request = CancelPickupRequest {
            pickup_token: pickup.token_number.clone(),
            registration_date: pickup.registered_at.date_naive(),
            reason: reason.clone(),
        };

        match self.couriers.cancel_pickup(pickup.courier, &request).await {
            Ok(CarrierResult::Success(cancellation)) => {
                pickup.cancellation = Some(PickupCancellationRecord {
                    cancelled: true,
                    cancelled_at: Utc::now(),
                    reason,
                    carrier_status: Some(cancellation.status),
                });
                let mut patch = OrderPatch {
                    pickup: Some(pickup.clone()),
                    ..Default::default()
                };
                self.settle(effect, None, &mut patch);
                self.write(order_id, patch).await?;

                info!("Pickup {} cancelled for order {}", pickup.token_number, order.order_number);
                self.notify(
                    FulfillmentEventKind::PickupCancelled,
                    order_id,
                    json!({
                        "courier": pickup.courier,
                        "token_number": pickup.token_number,
                    }),
                )
                .await;
                Ok(CancelOutcome::Cancelled { pickup })
            }
            Ok(CarrierResult::Rejected(rejection)) => {
                let entry = ErrorLogEntry::new(FulfillmentOperation::PickupCancellation, &rejection.message)
                    .with_provider(rejection.details.clone(), rejection.provider_status_code);
                self.record_failure(order_id, effect, entry).await?;
                Ok(CancelOutcome::Rejected { rejection })
            }
            Err(err) => {
                let message = err.to_string();
                let entry = ErrorLogEntry::new(FulfillmentOperation::PickupCancellation, &message);
                self.record_failure(order_id, effect, entry).await?;
                Ok(CancelOutcome::Failed { message })
            }
        }
    }

    async fn generate_waybill_locked(&self, order_id: Uuid) -> Result<WaybillOutcome, FulfillmentError> {
        let order = self.find_order(order_id).await?;
        if let Some(waybill) = order.waybill.clone() {
            return Ok(WaybillOutcome::AlreadyGenerated { waybill });
        }
        if order.status == OrderStatus::Cancelled {
            return Ok(WaybillOutcome::Failed {
                message: format!("Order {} is cancelled", order.order_number),
            });
        }

        let courier = match self.courier_for(&order) {
            Ok(courier) => courier,
            Err(err) => {
                let message = err.to_string();
                let entry = ErrorLogEntry::new(FulfillmentOperation::WaybillGeneration, &message);
                self.record_failure(order_id, None, entry).await?;
                return Ok(WaybillOutcome::Failed { message });
            }
        };

        let request = self.waybill_request(&order);
        match self.couriers.generate_waybill(courier, &request).await {
            Ok(CarrierResult::Success(issued)) => {
                let waybill = WaybillRecord {
                    courier,
                    awb_number: issued.awb_number,
                    status: issued.status,
                    generated_at: Utc::now(),
                    destination_area: issued.destination_area,
                    destination_location: issued.destination_location,
                    raw: issued.raw,
                };
                let patch = OrderPatch {
                    courier: Some(courier),
                    waybill: Some(waybill.clone()),
                    ..Default::default()
                };
                self.write(order_id, patch).await?;

                info!(
                    "Waybill {} generated with {} for order {}",
                    waybill.awb_number, courier, order.order_number
                );
                self.notify(
                    FulfillmentEventKind::WaybillGenerated,
                    order_id,
                    json!({
                        "courier": courier,
                        "awb_number": waybill.awb_number,
                    }),
                )
                .await;
                Ok(WaybillOutcome::Generated { waybill })
            }
            Ok(CarrierResult::Rejected(rejection)) => {
                let entry = ErrorLogEntry::new(FulfillmentOperation::WaybillGeneration, &rejection.message)
                    .with_provider(rejection.details.clone(), rejection.provider_status_code);
                self.record_failure(order_id, None, entry).await?;
                Ok(WaybillOutcome::Rejected { rejection })
            }
            Err(err) => {
                let message = err.to_string();
                let entry = ErrorLogEntry::new(FulfillmentOperation::WaybillGeneration, &message);
                self.record_failure(order_id, None, entry).await?;
                Ok(WaybillOutcome::Failed { message })
            }
        }
    }

    /// Run `op` under the per-order lock, or return `busy` if someone else holds it.
    async fn with_lock<T, F, Fut>(&self, order_id: Uuid, busy: T, op: F) -> Result<T, FulfillmentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FulfillmentError>>,
    {
        let ttl = Duration::from_secs(self.settings.lock_ttl_secs);
        let Some(token) = self.lock.try_lock(order_id, ttl).await? else {
            info!("Order {} is locked by another worker", order_id);
            return Ok(busy);
        };
        let result = op().await;
        if let Err(err) = self.lock.unlock(order_id, token).await {
            warn!("Failed to release lock for order {}: {}", order_id, err);
        }
        result
    }

    /// The courier already bound to the order, else the selection engine's pick.
    fn courier_for(&self, order: &Order) -> Result<CourierCode, CourierError> {
        if let Some(courier) = order.courier {
            return Ok(courier);
        }
        let profile = ShipmentProfile {
            destination: order.shipping_address.country.clone(),
            weight_kg: self.pickup_weight(order),
            declared_value: order.total_amount,
            priority: order.service,
            user_preference: order.preferred_courier.clone(),
        };
        let recommendation = self.couriers.select_courier(&profile)?;
        debug!(
            "Selected {} for order {}: {}",
            recommendation.primary, order.order_number, recommendation.reason
        );
        Ok(recommendation.primary)
    }

    fn pickup_weight(&self, order: &Order) -> f64 {
        order
            .estimated_weight_kg(self.settings.default_item_weight_kg)
            .max(self.settings.min_pickup_weight_kg)
            .min(self.settings.max_pickup_weight_kg)
    }

    fn pickup_request(&self, order: &Order) -> PickupRequest {
        let description = order.package_description();
        PickupRequest {
            reference: order.order_number.clone(),
            sender: self.sender.clone(),
            pieces: order.piece_count().max(1),
            weight_kg: self.pickup_weight(order),
            declared_value: order.total_amount,
            pickup_date: Utc::now().date_naive(),
            pickup_time: self.settings.pickup_time.clone(),
            office_close_time: self.settings.office_close_time.clone(),
            remarks: (!description.is_empty()).then_some(description),
        }
    }

    fn waybill_request(&self, order: &Order) -> WaybillRequest {
        WaybillRequest {
            shipper: self.sender.clone(),
            consignee: order.shipping_address.clone(),
            package: PackageDetails {
                weight_kg: self.pickup_weight(order),
                pieces: order.piece_count().max(1),
                declared_value: order.total_amount,
                description: order.package_description(),
            },
            service: order.service,
            reference: order.order_number.clone(),
            pickup_date: Utc::now().date_naive(),
            pickup_time: self.settings.pickup_time.clone(),
            collectable_amount: if order.cash_on_delivery { order.total_amount } else { 0.0 },
        }
    }

    /// Fold the outcome of a queued effect into `patch`.
    fn settle(&self, effect: Option<PendingEffect>, failure: Option<&str>, patch: &mut OrderPatch) {
        let Some(mut effect) = effect else {
            return;
        };
        match failure {
            None => patch.remove_effects.push(effect.id),
            Some(message) => {
                if effect.record_failure(message, self.settings.outbox_max_attempts) {
                    warn!(
                        "Giving up on {} after {} attempt(s)",
                        effect.effect.name(),
                        effect.attempts
                    );
                    patch.remove_effects.push(effect.id);
                } else {
                    patch.upsert_effects.push(effect);
                }
            }
        }
    }

    async fn record_failure(
        &self,
        order_id: Uuid,
        effect: Option<PendingEffect>,
        entry: ErrorLogEntry,
    ) -> Result<(), FulfillmentError> {
        warn!("{} failed for order {}: {}", entry.operation.as_str(), order_id, entry.message);
        let message = entry.message.clone();
        let mut patch = OrderPatch::error(entry);
        self.settle(effect, Some(&message), &mut patch);
        self.write(order_id, patch).await?;
        Ok(())
    }

    /// Apply `patch` to the latest version of the order, re-reading on conflicts.
    async fn write(&self, order_id: Uuid, patch: OrderPatch) -> Result<Order, FulfillmentError> {
        if patch.is_empty() {
            return self.find_order(order_id).await;
        }
        let mut attempt = 1;
        loop {
            let current = self.find_order(order_id).await?;
            match self.store.update(order_id, current.version, patch.clone()).await {
                Ok(updated) => return Ok(updated),
                Err(StoreError::VersionConflict { .. }) if attempt < WRITE_ATTEMPTS => {
                    debug!("Version conflict writing order {}, retrying", order_id);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn notify(&self, kind: FulfillmentEventKind, order_id: Uuid, payload: serde_json::Value) {
        let event = FulfillmentEvent::new(kind, order_id, payload);
        if let Err(err) = self.notifier.notify(event).await {
            warn!("Notification {} for order {} failed: {}", kind.as_str(), order_id, err);
        }
    }
}

fn queued(order: &Order, matches: impl Fn(&SideEffect) -> bool) -> Option<PendingEffect> {
    order.pending_effects.iter().find(|e| matches(&e.effect)).cloned()
}
