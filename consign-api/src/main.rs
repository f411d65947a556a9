use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use consign_api::{app, worker, AppState};
use consign_carriers::{BlueDartService, DhlService};
use consign_core::{LogNotifier, NotificationSink};
use consign_courier::{CourierManager, SelectionRules};
use consign_order::{FulfillmentOrchestrator, InProcessOrderLock, MemoryOrderStore, OrderLock, OrderStore};
use consign_store::{AppConfig, DbClient, PgOrderStore, RedisOrderLock, StoreBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "consign_api=debug,consign_order=debug,consign_courier=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().expect("Failed to load config");
    tracing::info!("Starting Consign API on port {}", config.server.port);

    let mut rules = SelectionRules::default();
    if !config.selection.is_empty() {
        rules = rules
            .apply(config.selection.clone())
            .expect("Invalid selection rules in config");
    }

    let mut couriers = CourierManager::new(config.server.home_country.clone(), rules);
    if let Some(bluedart) = config.carriers.bluedart.clone() {
        let service = BlueDartService::new(bluedart).expect("Failed to build Blue Dart client");
        couriers = couriers.with_provider(Arc::new(service));
    }
    if let Some(dhl) = config.carriers.dhl.clone() {
        let service = DhlService::new(dhl).expect("Failed to build DHL client");
        couriers = couriers.with_provider(Arc::new(service));
    }
    tracing::info!("Couriers configured: {:?}", couriers.couriers());
    let couriers = Arc::new(couriers);

    let store: Arc<dyn OrderStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory order store; orders are lost on restart");
            Arc::new(MemoryOrderStore::new())
        }
        StoreBackend::Postgres => {
            let url = config
                .store
                .database_url
                .as_deref()
                .expect("store.database_url is required for the postgres backend");
            let db = DbClient::new(url).await.expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");
            Arc::new(PgOrderStore::new(db.pool.clone()))
        }
    };

    let lock: Arc<dyn OrderLock> = match config.store.redis_url.as_deref() {
        Some(url) => Arc::new(RedisOrderLock::new(url).expect("Failed to open Redis client")),
        None => Arc::new(InProcessOrderLock::new()),
    };

    let orchestrator = Arc::new(FulfillmentOrchestrator::new(
        couriers.clone(),
        store,
        lock,
        notifier(&config),
        config.sender.clone(),
        config.fulfillment.clone(),
    ));

    tokio::spawn(worker::start_outbox_worker(
        orchestrator.clone(),
        Duration::from_secs(config.fulfillment.worker_interval_secs.max(1)),
    ));

    let app = app(AppState {
        orchestrator,
        couriers,
        sender: Arc::new(config.sender.clone()),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[cfg(feature = "kafka")]
fn notifier(config: &AppConfig) -> Arc<dyn NotificationSink> {
    match &config.kafka {
        Some(kafka) => Arc::new(
            consign_store::KafkaNotifier::new(&kafka.brokers, &kafka.topic).expect("Failed to create Kafka producer"),
        ),
        None => Arc::new(LogNotifier),
    }
}

#[cfg(not(feature = "kafka"))]
fn notifier(config: &AppConfig) -> Arc<dyn NotificationSink> {
    if config.kafka.is_some() {
        tracing::warn!("Kafka is configured but this build lacks the `kafka` feature; notifications are only logged");
    }
    Arc::new(LogNotifier)
}
