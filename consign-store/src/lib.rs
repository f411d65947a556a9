pub mod app_config;
pub mod database;
#[cfg(feature = "kafka")]
pub mod events;
pub mod order_repo;
pub mod redis_repo;

pub use app_config::{AppConfig, StoreBackend};
pub use database::DbClient;
#[cfg(feature = "kafka")]
pub use events::KafkaNotifier;
pub use order_repo::PgOrderStore;
pub use redis_repo::RedisOrderLock;
