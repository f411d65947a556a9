use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use consign_order::{Order, OrderPatch, OrderStore, StoreError};

/// Orders kept as JSONB documents with the lifecycle columns the queries filter on.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_back(&self, order: &Order, expected_version: u64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, version = $3, has_pending_effects = $4, document = $5, updated_at = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.version as i64)
        .bind(!order.pending_effects.is_empty())
        .bind(Json(order))
        .bind(order.updated_at)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(result.rows_affected() == 1)
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row: Option<Json<Order>> = sqlx::query_scalar("SELECT document FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(|Json(order)| order))
    }

    async fn save(&self, order: &Order) -> Result<Order, StoreError> {
        let mut stored = order.clone();
        stored.version = 1;

        let result = sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, status, version, has_pending_effects, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(stored.id)
        .bind(&stored.order_number)
        .bind(stored.status.as_str())
        .bind(stored.version as i64)
        .bind(!stored.pending_effects.is_empty())
        .bind(Json(&stored))
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(stored.id));
        }
        Ok(stored)
    }

    async fn update(&self, id: Uuid, expected_version: u64, patch: OrderPatch) -> Result<Order, StoreError> {
        let mut order = self.find_by_id(id).await?.ok_or(StoreError::NotFound(id))?;
        if order.version != expected_version {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
            });
        }

        patch.apply_to(&mut order);

        // Compare-and-swap on the version column; losing the race is a conflict.
        if !self.write_back(&order, expected_version).await? {
            return Err(StoreError::VersionConflict {
                id,
                expected: expected_version,
            });
        }
        Ok(order)
    }

    async fn find_with_pending_effects(&self, limit: usize) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<Json<Order>> = sqlx::query_scalar(
            "SELECT document FROM orders WHERE has_pending_effects ORDER BY updated_at LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().map(|Json(order)| order).collect())
    }
}
