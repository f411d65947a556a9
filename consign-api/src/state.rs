use std::sync::Arc;

use consign_core::SenderProfile;
use consign_courier::CourierManager;
use consign_order::FulfillmentOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FulfillmentOrchestrator>,
    pub couriers: Arc<CourierManager>,
    /// Used for ad-hoc shipments booked through the courier endpoints
    pub sender: Arc<SenderProfile>,
}
