use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Order;
use crate::repository::{OrderPatch, OrderStore, StoreError};

/// Process-local order store for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate(order.id));
        }
        let mut stored = order.clone();
        stored.version = 1;
        orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: Uuid, expected_version: u64, patch: OrderPatch) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if order.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
            });
        }
        patch.apply_to(order);
        Ok(order.clone())
    }

    async fn find_with_pending_effects(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut pending: Vec<Order> = orders
            .values()
            .filter(|o| !o.pending_effects.is_empty())
            .cloned()
            .collect();
        pending.sort_by_key(|o| o.updated_at);
        pending.truncate(limit);
        Ok(pending)
    }
}
