use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use consign_order::{OrderLock, StoreError};

const RELEASE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    else
        return 0
    end
"#;

/// Per-order lock shared by every API and worker process.
/// Each acquisition stores its own token, so a holder whose lock expired never
/// releases the next holder's lock.
#[derive(Clone)]
pub struct RedisOrderLock {
    client: redis::Client,
}

impl RedisOrderLock {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn key(order_id: Uuid) -> String {
        format!("order-lock:{}", order_id)
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl OrderLock for RedisOrderLock {
    async fn try_lock(&self, order_id: Uuid, ttl: Duration) -> Result<Option<Uuid>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(backend)?;
        let token = Uuid::new_v4();

        // SET NX: only set if nobody holds the key
        let result: Option<String> = redis::cmd("SET")
            .arg(Self::key(order_id))
            .arg(token.to_string())
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(backend)?;

        debug!("Lock for order {} acquired: {}", order_id, result.is_some());
        Ok(result.map(|_| token))
    }

    async fn unlock(&self, order_id: Uuid, token: Uuid) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(backend)?;
        let _: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(Self::key(order_id))
            .arg(token.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_per_order() {
        let id = Uuid::new_v4();
        assert_eq!(RedisOrderLock::key(id), format!("order-lock:{}", id));
    }
}
