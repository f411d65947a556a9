use async_trait::async_trait;
use consign_shared::models::events::FulfillmentEvent;

/// Outbound port to the notification collaborator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Request a notification for a fulfillment event
    async fn notify(&self, event: FulfillmentEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Sink that only records the request in the log
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, event: FulfillmentEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            order_id = %event.order_id,
            event = event.event.as_str(),
            "Notification requested"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consign_shared::models::events::FulfillmentEventKind;

    #[tokio::test]
    async fn test_log_notifier_accepts_events() {
        let event = FulfillmentEvent::new(
            FulfillmentEventKind::WaybillGenerated,
            uuid::Uuid::new_v4(),
            serde_json::json!({}),
        );
        assert!(LogNotifier.notify(event).await.is_ok());
    }
}
