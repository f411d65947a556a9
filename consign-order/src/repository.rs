use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use consign_core::{CourierCode, TrackingSnapshot};

use crate::models::{ErrorLogEntry, Order, OrderStatus, PickupRecord, WaybillRecord};
use crate::outbox::PendingEffect;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {id} was modified concurrently (expected version {expected})")]
    VersionConflict { id: Uuid, expected: u64 },

    #[error("Order already exists: {0}")]
    Duplicate(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Field-level change to an order. Every field is optional so a patch can be
/// re-applied to a newer version of the same order.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub courier: Option<CourierCode>,
    pub pickup: Option<PickupRecord>,
    pub waybill: Option<WaybillRecord>,
    pub tracking: Option<TrackingSnapshot>,
    pub append_errors: Vec<ErrorLogEntry>,
    /// Inserted, or replacing the effect with the same id
    pub upsert_effects: Vec<PendingEffect>,
    pub remove_effects: Vec<Uuid>,
}

impl OrderPatch {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn error(entry: ErrorLogEntry) -> Self {
        Self {
            append_errors: vec![entry],
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.courier.is_none()
            && self.pickup.is_none()
            && self.waybill.is_none()
            && self.tracking.is_none()
            && self.append_errors.is_empty()
            && self.upsert_effects.is_empty()
            && self.remove_effects.is_empty()
    }

    /// Apply to `order`, bumping its version and `updated_at`.
    pub fn apply_to(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(courier) = self.courier {
            order.courier = Some(courier);
        }
        if let Some(pickup) = self.pickup {
            order.pickup = Some(pickup);
        }
        if let Some(waybill) = self.waybill {
            order.waybill = Some(waybill);
        }
        if let Some(tracking) = self.tracking {
            order.tracking = Some(tracking);
        }
        order.fulfillment_errors.extend(self.append_errors);
        for effect in self.upsert_effects {
            match order.pending_effects.iter_mut().find(|e| e.id == effect.id) {
                Some(existing) => *existing = effect,
                None => order.pending_effects.push(effect),
            }
        }
        order.pending_effects.retain(|e| !self.remove_effects.contains(&e.id));
        order.version += 1;
        order.updated_at = Utc::now();
    }
}

/// Persistence contract for order documents.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Insert a new order. Its version is reset to 1.
    async fn save(&self, order: &Order) -> Result<Order, StoreError>;

    /// Apply `patch` if the stored version still equals `expected_version`.
    async fn update(&self, id: Uuid, expected_version: u64, patch: OrderPatch) -> Result<Order, StoreError>;

    /// Orders that still carry queued side-effects, oldest first.
    async fn find_with_pending_effects(&self, limit: usize) -> Result<Vec<Order>, StoreError>;
}
