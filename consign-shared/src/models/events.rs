use uuid::Uuid;

/// Kind of notification the fulfillment layer asks the notification collaborator to send.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentEventKind {
    PickupRegistered,
    PickupCancelled,
    WaybillGenerated,
    TrackingUpdated,
}

impl FulfillmentEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentEventKind::PickupRegistered => "pickup_registered",
            FulfillmentEventKind::PickupCancelled => "pickup_cancelled",
            FulfillmentEventKind::WaybillGenerated => "waybill_generated",
            FulfillmentEventKind::TrackingUpdated => "tracking_updated",
        }
    }
}

/// Notification request. Never carries a message body, only the facts a
/// notification layer needs to compose one.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct FulfillmentEvent {
    pub event: FulfillmentEventKind,
    pub order_id: Uuid,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

impl FulfillmentEvent {
    pub fn new(event: FulfillmentEventKind, order_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            event,
            order_id,
            payload,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_name() {
        let event = FulfillmentEvent::new(
            FulfillmentEventKind::PickupRegistered,
            Uuid::new_v4(),
            serde_json::json!({"token_number": "PK123"}),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "pickup_registered");
        assert_eq!(json["payload"]["token_number"], "PK123");
        assert_eq!(FulfillmentEventKind::TrackingUpdated.as_str(), "tracking_updated");
    }
}
