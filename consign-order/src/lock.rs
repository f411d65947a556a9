use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repository::StoreError;

/// Per-order mutual exclusion around check-then-act carrier sequences.
/// Locks expire after `ttl` so a crashed holder cannot wedge an order.
#[async_trait]
pub trait OrderLock: Send + Sync {
    /// The holder's token if the lock was taken, `None` if someone else holds it.
    async fn try_lock(&self, order_id: Uuid, ttl: Duration) -> Result<Option<Uuid>, StoreError>;

    /// Release the lock only if `token` still holds it.
    async fn unlock(&self, order_id: Uuid, token: Uuid) -> Result<(), StoreError>;
}

struct Holder {
    token: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InProcessOrderLock {
    held: Mutex<HashMap<Uuid, Holder>>,
}

impl InProcessOrderLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderLock for InProcessOrderLock {
    async fn try_lock(&self, order_id: Uuid, ttl: Duration) -> Result<Option<Uuid>, StoreError> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        match held.get(&order_id) {
            Some(holder) if holder.expires_at > now => Ok(None),
            _ => {
                let token = Uuid::new_v4();
                held.insert(
                    order_id,
                    Holder {
                        token,
                        expires_at: now + ttl,
                    },
                );
                Ok(Some(token))
            }
        }
    }

    async fn unlock(&self, order_id: Uuid, token: Uuid) -> Result<(), StoreError> {
        let mut held = self.held.lock().await;
        if held.get(&order_id).is_some_and(|holder| holder.token == token) {
            held.remove(&order_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let lock = InProcessOrderLock::new();
        let id = Uuid::new_v4();

        let token = lock.try_lock(id, Duration::from_secs(30)).await.unwrap().unwrap();
        assert!(lock.try_lock(id, Duration::from_secs(30)).await.unwrap().is_none());
        assert!(lock.try_lock(Uuid::new_v4(), Duration::from_secs(30)).await.unwrap().is_some());

        lock.unlock(id, token).await.unwrap();
        assert!(lock.try_lock(id, Duration::from_secs(30)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_taken() {
        let lock = InProcessOrderLock::new();
        let id = Uuid::new_v4();

        assert!(lock.try_lock(id, Duration::from_millis(0)).await.unwrap().is_some());
        assert!(lock.try_lock(id, Duration::from_secs(30)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_holder_cannot_release_new_lock() {
        let lock = InProcessOrderLock::new();
        let id = Uuid::new_v4();

        let stale = lock.try_lock(id, Duration::from_millis(0)).await.unwrap().unwrap();
        let current = lock.try_lock(id, Duration::from_secs(30)).await.unwrap().unwrap();

        lock.unlock(id, stale).await.unwrap();
        assert!(lock.try_lock(id, Duration::from_secs(30)).await.unwrap().is_none());

        lock.unlock(id, current).await.unwrap();
        assert!(lock.try_lock(id, Duration::from_secs(30)).await.unwrap().is_some());
    }
}
