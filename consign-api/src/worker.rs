use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use consign_order::FulfillmentOrchestrator;

/// Orders per drain pass
const BATCH_SIZE: usize = 50;

/// Periodically drains side-effects left queued on orders.
pub async fn start_outbox_worker(orchestrator: Arc<FulfillmentOrchestrator>, every: Duration) {
    info!("Outbox worker started, draining every {:?}", every);
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        drain_once(&orchestrator).await;
    }
}

/// One drain pass. Returns the number of effects attempted.
pub async fn drain_once(orchestrator: &FulfillmentOrchestrator) -> usize {
    match orchestrator.process_pending(BATCH_SIZE).await {
        Ok(0) => {
            debug!("No queued side-effects");
            0
        }
        Ok(attempted) => {
            info!("Processed {} queued side-effect(s)", attempted);
            attempted
        }
        Err(e) => {
            error!("Outbox drain failed: {}", e);
            0
        }
    }
}
