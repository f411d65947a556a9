use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{error, info};

use consign_core::NotificationSink;
use consign_shared::models::events::FulfillmentEvent;

/// Publishes notification requests for the notification service to pick up.
#[derive(Clone)]
pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for KafkaNotifier {
    async fn notify(&self, event: FulfillmentEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(&event)?;
        let key = event.order_id.to_string();
        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent {} for order {}: partition {} offset {}",
                    event.event.as_str(),
                    key,
                    delivery.partition,
                    delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to publish {} to {}: {}", event.event.as_str(), self.topic, e);
                Err(Box::new(e))
            }
        }
    }
}
